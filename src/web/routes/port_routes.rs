use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;

use crate::fleet::ports::PortPair;
use crate::web::{AppError, AppState};

async fn available_ports_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<PortPair>, AppError> {
    Ok(Json(app_state.fleet.available_ports().await?))
}

pub fn create_ports_router() -> Router<Arc<AppState>> {
    Router::new().route("/available", get(available_ports_handler))
}
