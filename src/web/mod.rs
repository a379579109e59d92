//! Web server module: the HTTP reporting API.

mod handlers;

use crate::config::MonitorConfig;
use crate::monitor::Monitor;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

/// Web server for healthwatch.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(config: &MonitorConfig, monitor: Arc<Monitor>) -> Self {
        Self {
            port: config.http_port,
            state: AppState { monitor },
        }
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "Web server listening");

        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        // Report page
        .route("/", get(handlers::handle_index))
        // API endpoints
        .route("/api/status", get(handlers::handle_status))
        .route("/api/history", get(handlers::handle_history))
        .route("/api/statistics", get(handlers::handle_statistics))
        .route(
            "/api/targets",
            get(handlers::handle_get_targets).post(handlers::handle_create_target),
        )
        .route("/api/targets/{name}", delete(handlers::handle_delete_target))
        .route("/api/sampler", get(handlers::handle_sampler))
        .route("/api/sampler/start", post(handlers::handle_sampler_start))
        .route("/api/sampler/stop", post(handlers::handle_sampler_stop))
        .route("/api/report/{format}", get(handlers::handle_report))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
