//! Server configuration from CLI flags and environment variables.
//!
//! Every flag has an environment fallback (via clap's `env` attribute);
//! a `.env` file in the working directory is loaded before parsing.

use std::net::{AddrParseError, IpAddr, SocketAddr};

use crate::random::DEFAULT_RANDOM_TASK_URL;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_NAMESPACE: &str = "tasks";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REDIS_URL (or --redis-url) is required when the store is redis")]
    MissingRedisUrl,

    #[error("invalid host {host:?}: {source}")]
    InvalidHost {
        host: String,
        source: AddrParseError,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Redis,
    Memory,
}

#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task tracking HTTP service")]
pub struct CliArgs {
    /// Backing store for task records.
    #[arg(long, value_enum, env = "TASK_STORE")]
    pub store: Option<StoreKind>,

    /// Redis connection string, e.g. `redis://127.0.0.1:6379`.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Prefix for every Redis key the service writes.
    #[arg(long, env = "TASK_NAMESPACE")]
    pub namespace: Option<String>,

    /// Address to listen on.
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Upstream used by `POST /random-tasks`.
    #[arg(long, env = "RANDOM_TASK_URL")]
    pub random_task_url: Option<String>,

    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter` directive).
    #[arg(long, env = "TASK_LOG")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Redis { url: String, namespace: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub bind_addr: SocketAddr,
    pub random_task_url: String,
    pub log_level: String,
}

impl Config {
    /// Resolves CLI arguments into a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRedisUrl`] when the redis store is
    /// selected without a connection string, and
    /// [`ConfigError::InvalidHost`] when the host is not an IP address.
    pub fn from_cli(cli: &CliArgs) -> Result<Self, ConfigError> {
        let store = match cli.store.unwrap_or_default() {
            StoreKind::Redis => StoreConfig::Redis {
                url: cli
                    .redis_url
                    .clone()
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::MissingRedisUrl)?,
                namespace: cli
                    .namespace
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            },
            StoreKind::Memory => StoreConfig::Memory,
        };

        let host = cli.host.as_deref().unwrap_or(DEFAULT_HOST);
        let ip: IpAddr = host.parse().map_err(|source| ConfigError::InvalidHost {
            host: host.to_string(),
            source,
        })?;

        Ok(Self {
            store,
            bind_addr: SocketAddr::new(ip, cli.port.unwrap_or(DEFAULT_PORT)),
            random_task_url: cli
                .random_task_url
                .clone()
                .unwrap_or_else(|| DEFAULT_RANDOM_TASK_URL.to_string()),
            log_level: cli
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}
