//! Server wiring: state, router, and the listen loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use reelmerge::config::ReelmergeConfig;
use reelmerge::store::{FsStore, OutputStore};
use reelmerge::{combine, JobOrchestrator, JobRegistry, TracingObserver};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;

/// Shared application state
pub struct AppState {
    pub registry: JobRegistry,
    pub outputs: Arc<dyn OutputStore>,
}

impl AppState {
    /// Wires a filesystem store, the configured combiner, and a registry
    /// from `config`. Creates the storage directories.
    pub async fn from_config(config: &ReelmergeConfig) -> Result<Arc<Self>> {
        let store = Arc::new(FsStore::from_config(&config.storage));
        store
            .prepare()
            .await
            .context("failed to create storage directories")?;

        let combiner = combine::from_config(&config.merge, Arc::clone(&store));
        let orchestrator = Arc::new(JobOrchestrator::new(
            combiner,
            config.merge.max_concurrent_merges,
        ));
        let registry = JobRegistry::new(store.clone(), orchestrator)
            .with_observer(Arc::new(TracingObserver))
            .with_max_expected_chunks(config.merge.max_expected_chunks);

        Ok(Arc::new(Self {
            registry,
            outputs: store,
        }))
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>, max_chunk_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/create-job", post(handlers::create_job))
        .route("/add-video/{job_id}", post(handlers::add_video))
        .route("/status/{job_id}", get(handlers::status))
        .route("/download/{job_id}", get(handlers::download))
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(max_chunk_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The reelmerge HTTP server
pub struct ReelmergeServer;

impl ReelmergeServer {
    /// Serve until Ctrl+C.
    pub async fn start(config: ReelmergeConfig) -> Result<()> {
        let state = AppState::from_config(&config).await?;
        let app = router(state, config.server.max_chunk_bytes);

        let listener = TcpListener::bind(&config.server.bind)
            .await
            .with_context(|| format!("failed to bind {}", config.server.bind))?;
        info!(
            bind = %config.server.bind,
            combiner = ?config.merge.combiner,
            max_concurrent_merges = config.merge.max_concurrent_merges,
            "reelmerge server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("reelmerge server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
