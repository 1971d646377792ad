use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::fleet::control::ContainerStatus;
use crate::fleet::{ContainerView, CreateContainerRequest};
use crate::web::models::{
    ActionResponse, CountryChangeRequest, CountryChangeResponse, CreateContainerResponse,
    NextNameResponse,
};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_containers_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContainerView>>, AppError> {
    Ok(Json(app_state.fleet.list_containers().await?))
}

async fn all_statuses_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, ContainerStatus>>, AppError> {
    Ok(Json(app_state.fleet.all_statuses().await?))
}

async fn next_name_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<NextNameResponse>, AppError> {
    let name = app_state.fleet.next_container_name().await?;
    Ok(Json(NextNameResponse { name }))
}

async fn container_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ContainerStatus>, AppError> {
    Ok(Json(app_state.fleet.container_status(&name).await?))
}

async fn create_container_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<CreateContainerRequest>, JsonRejection>,
) -> Result<Json<CreateContainerResponse>, AppError> {
    let Json(request) = payload?;
    let container = app_state.fleet.create_container(request).await?;
    Ok(Json(CreateContainerResponse {
        success: true,
        message: format!("Container {} created and started", container.name),
        container,
    }))
}

async fn start_container_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    app_state.fleet.start_container(&name).await?;
    Ok(Json(ActionResponse::ok(format!("Container {name} started"))))
}

async fn stop_container_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    app_state.fleet.stop_container(&name).await?;
    Ok(Json(ActionResponse::ok(format!("Container {name} stopped"))))
}

async fn delete_container_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    app_state.fleet.delete_container(&name).await?;
    Ok(Json(ActionResponse::ok(format!("Container {name} deleted"))))
}

/// Blocks for up to the reconnect budget. If the client goes away the
/// verification is dropped; the new country is already persisted by then.
async fn change_country_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<CountryChangeRequest>, JsonRejection>,
) -> Result<Json<CountryChangeResponse>, AppError> {
    let Json(request) = payload?;
    let country = request.country.unwrap_or_default();
    let change = app_state.fleet.change_country(&name, &country).await?;

    let country = country.trim();
    let message = if change.confirmed {
        format!("Changed {name} to {country}")
    } else {
        format!("Changed {name} to {country}, reconnection not yet confirmed")
    };
    Ok(Json(CountryChangeResponse {
        success: true,
        message,
        status: change.status,
        confirmed: change.confirmed,
    }))
}

// --- Router ---

pub fn create_containers_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_containers_handler).post(create_container_handler))
        .route("/status", get(all_statuses_handler))
        .route("/name/next", get(next_name_handler))
        .route(
            "/{name}",
            get(container_status_handler).delete(delete_container_handler),
        )
        .route("/{name}/start", post(start_container_handler))
        .route("/{name}/stop", post(stop_container_handler))
        .route("/{name}/country", post(change_country_handler))
}
