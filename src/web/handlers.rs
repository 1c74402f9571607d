use super::AppState;
use crate::model::Asset;
use crate::search::{CacheError, CacheStats};
use axum::extract::rejection::FormRejection;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form, Json};
use serde::Deserialize;
use std::sync::Arc;

pub const FETCH_STARTED: &str = "Asset fetch and store initiated";
pub const FETCH_IN_PROGRESS: &str = "Asset fetch already in progress";

#[derive(Debug, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub query: String,
}

/// Error response with a plain text body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match &e {
            CacheError::OutOfRange { .. } | CacheError::EmptyQuery => {
                tracing::debug!("Rejected request: {}", e);
            }
            _ => tracing::error!("Cache unavailable: {}", e),
        }
        Self::bad_request(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

fn parse_page(raw: &str) -> Result<usize, ApiError> {
    raw.parse::<usize>()
        .map_err(|_| ApiError::bad_request(format!("Invalid page number '{}'", raw)))
}

pub async fn trigger_fetch(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.harvester.trigger() {
        (StatusCode::OK, FETCH_STARTED)
    } else {
        (StatusCode::OK, FETCH_IN_PROGRESS)
    }
}

pub async fn get_asset_page(
    Extension(state): Extension<Arc<AppState>>,
    Path(page): Path<String>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    let page = parse_page(&page)?;
    Ok(Json(state.cache.page(page).await?))
}

pub async fn query_assets(
    Extension(state): Extension<Arc<AppState>>,
    Path(page): Path<String>,
    form: Result<Form<QueryForm>, FormRejection>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    let Form(form) = form.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if form.query.trim().is_empty() {
        return Err(CacheError::EmptyQuery.into());
    }

    let page = parse_page(&page)?;
    Ok(Json(state.cache.query(&form.query, page).await?))
}

pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}
