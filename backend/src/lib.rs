//! Task tracking HTTP service.
//!
//! Layering, leaves first: [`store`] persists tasks, [`service`] applies
//! defaults and validation, [`api`] maps HTTP onto the service.

pub mod api;
pub mod config;
pub mod random;
pub mod service;
pub mod store;
