use std::sync::Arc;

use clap::Parser;
use task_backend::api::{self, AppState};
use task_backend::config::{CliArgs, Config, StoreConfig};
use task_backend::random::RandomTaskSource;
use task_backend::store::{InMemoryTaskStore, RedisTaskStore, TaskStore};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = CliArgs::parse();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Error loading configuration: {error}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store: Arc<dyn TaskStore> = match &config.store {
        StoreConfig::Redis { url, namespace } => {
            match RedisTaskStore::connect(url, namespace.as_str()).await {
                Ok(store) => {
                    tracing::info!(namespace = %store.namespace(), "using redis task store");
                    Arc::new(store)
                }
                Err(error) => {
                    tracing::error!(%error, "failed to connect to redis");
                    std::process::exit(1);
                }
            }
        }
        StoreConfig::Memory => {
            tracing::warn!("using in-memory task store, tasks will not survive a restart");
            Arc::new(InMemoryTaskStore::new())
        }
    };

    let random = match RandomTaskSource::new(config.random_task_url.clone()) {
        Ok(random) => {
            tracing::info!(url = %random.url(), "random task source configured");
            random
        }
        Err(error) => {
            tracing::error!(%error, "failed to build random task client");
            std::process::exit(1);
        }
    };

    let app = api::router(AppState::new(store, random));

    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(addr = %config.bind_addr, %error, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.bind_addr, "task server listening");

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "server error");
        std::process::exit(1);
    }

    tracing::info!("server shut down");
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
