//! HTTP listener of the review engine.
//!
//! Single-process cooperative async surface over the shared handles
//! (broker, task-info store, database, diff providers), all initialised
//! once in [`serve`]. Handlers yield at every store/broker/network call;
//! stage execution happens on the broker's worker threads, never here.

pub mod auth;
pub mod config;
pub mod core;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use diff_provider::{DiffProviderRegistry, GitcodeClient, GiteeClient, ProviderClient};
use review_pipeline::ReviewRuntime;
use review_store::ReviewStore;
use task_broker::Broker;
use task_info_store::TaskInfoStore;
use thiserror::Error;
use tracing::info;

use crate::config::ListenerConfig;
use crate::core::app_state::AppState;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] review_store::DbError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Builds the router over an already-initialised state. Exposed for tests.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health_route::health_route))
        .route("/api/v1/devagent", get(routes::devagent_route::devagent_route))
        .with_state(state)
}

/// Initialises every shared handle from the environment and serves until
/// shutdown.
pub async fn serve() -> Result<(), ServeError> {
    let config = ListenerConfig::from_env();

    let store = ReviewStore::connect(&config.database_url).await?;

    let broker = Broker::new(
        Duration::from_secs(config.result_expiry_secs),
        config.review.max_workers * 32,
    );
    let task_info = TaskInfoStore::new(Duration::from_secs(config.task_info_expiry_secs));

    let http = reqwest::Client::builder()
        .user_agent("devagent-backend/0.1")
        .build()?;
    let mut providers = DiffProviderRegistry::new();
    providers.register(ProviderClient::Gitcode(GitcodeClient::new(
        http.clone(),
        config.gitcode_api_base.clone(),
        config.gitcode_token.clone(),
    )));
    providers.register(ProviderClient::Gitee(GiteeClient::new(
        http,
        config.gitee_api_base.clone(),
        config.gitee_token.clone(),
    )));

    let runtime = ReviewRuntime::new(
        config.review.clone(),
        broker,
        task_info,
        store,
        providers,
    );

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, runtime);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("listening on {listen_addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Stops accepting requests on ctrl-c / SIGTERM; in-flight worker stages
/// (and their worktree cleanup) still run to completion on the blocking
/// pool before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
