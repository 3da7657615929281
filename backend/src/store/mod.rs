//! Persistence for task records.
//!
//! [`TaskStore`] is the seam between the service and the database. Two
//! implementations ship: [`RedisTaskStore`] for deployments and
//! [`InMemoryTaskStore`] for tests and local runs.

mod memory;
mod redis;

use async_trait::async_trait;
use task_shared::{Task, TaskStatus, TaskUpdate};

pub use self::memory::InMemoryTaskStore;
pub use self::redis::RedisTaskStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    Conflict(String),

    /// Connectivity or query failure in the backing database.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new task and returns its id.
    async fn create(&self, task: &Task) -> Result<String, StoreError>;

    /// Returns one page of tasks, newest first.
    ///
    /// `page` is 1-based. A filter or page with no matches yields an empty
    /// `Vec`, not an error.
    async fn list(
        &self,
        status: Option<TaskStatus>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Task>, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Task, StoreError>;

    /// Applies the present fields of `update` and refreshes `updated_at`.
    async fn update(&self, id: &str, update: &TaskUpdate) -> Result<(), StoreError>;

    /// Removes the task. Deleting an unknown id reports `NotFound`.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Translates a 1-based page into `(skip, limit)`.
pub(crate) fn window(page: u32, page_size: u32) -> (u64, u64) {
    let skip = u64::from(page.saturating_sub(1)) * u64::from(page_size);
    (skip, u64::from(page_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 10, (0, 10))]
    #[case(2, 10, (10, 10))]
    #[case(3, 7, (14, 7))]
    #[case(0, 5, (0, 5))]
    fn window_skips_previous_pages(
        #[case] page: u32,
        #[case] size: u32,
        #[case] expected: (u64, u64),
    ) {
        assert_eq!(window(page, size), expected);
    }

    #[test]
    fn window_does_not_overflow() {
        let (skip, limit) = window(u32::MAX, u32::MAX);
        assert_eq!(skip, u64::from(u32::MAX - 1) * u64::from(u32::MAX));
        assert_eq!(limit, u64::from(u32::MAX));
    }
}
