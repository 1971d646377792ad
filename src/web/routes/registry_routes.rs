use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;

use crate::web::{AppError, AppState};

/// Serves the registry document byte for byte.
async fn registry_document_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    match app_state.fleet.registry_document().await? {
        Some(contents) => Ok(([(header::CONTENT_TYPE, "application/json")], contents).into_response()),
        None => Err(AppError::NotFound("containers.json not found".to_string())),
    }
}

pub fn create_registry_router() -> Router<Arc<AppState>> {
    Router::new().route("/containers.json", get(registry_document_handler))
}
