//! HTTP server

use super::config::ServerConfig;
use super::handlers::{self, AppState};
use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, post},
    Router,
};
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

/// Build the application router.
///
/// Chain routes are mounted under `state.config.path`; `/health` and
/// `/openapi.json` sit at the root.
pub fn build_router(state: AppState) -> Router {
    let chain_routes = Router::new()
        .route("/invoke", post(handlers::invoke_handler))
        .route("/batch", post(handlers::batch_handler))
        .route("/stream", post(handlers::stream_handler))
        .route("/input_schema", get(handlers::input_schema_handler))
        .route("/output_schema", get(handlers::output_schema_handler));

    let prefix = state.config.path.trim_end_matches('/').to_string();
    let app = if prefix.is_empty() {
        Router::new().merge(chain_routes)
    } else {
        Router::new().nest(&prefix, chain_routes)
    };

    app.route("/health", get(health_check))
        .route("/openapi.json", get(handlers::openapi_handler))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
}

/// Bind the configured address and serve until the process stops
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port)).await?;

    info!(
        "Starting {} on http://{} (routes under {})",
        state.config.title,
        listener.local_addr()?,
        state.config.path
    );

    serve(listener, state).await
}

/// Serve on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Health check handler
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Logging middleware
async fn logging_middleware(req: Request, next: Next) -> axum::response::Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    info!("{} {} {} {:?}", method, uri, response.status(), start.elapsed());

    response
}
