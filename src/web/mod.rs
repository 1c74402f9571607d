//! HTTP surface
//!
//! Routes:
//! - `GET /trigger-fetch` starts a background harvest
//! - `GET /assets/:page` browses the corpus in stored order
//! - `POST /query/:page` ranks the corpus against the `query` form field
//! - `GET /health` reports cache statistics

mod handlers;

pub use handlers::ApiError;

use crate::crawler::Harvester;
use crate::search::SearchCache;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Shared state handed to every handler
pub struct AppState {
    pub cache: Arc<SearchCache>,
    pub harvester: Arc<Harvester>,
}

/// Builds the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/trigger-fetch", get(handlers::trigger_fetch))
        .route("/assets/:page", get(handlers::get_asset_page))
        .route("/query/:page", post(handlers::query_assets))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn(log_request))
        .layer(Extension(state))
}

/// Serves the router on `listener` until the process exits
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }
    axum::serve(listener, router(state)).await
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        "{} {} -> {} ({:?})",
        method,
        uri,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
