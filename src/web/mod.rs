use axum::{Router, http::Method, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::fleet::FleetManager;
use crate::server::config::ServerConfig;
use crate::web::routes::{container_routes, country_routes, port_routes, registry_routes};

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<FleetManager>,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/containers", container_routes::create_containers_router())
        .nest("/api/ports", port_routes::create_ports_router())
        .nest("/api/countries", country_routes::create_countries_router())
        .merge(registry_routes::create_registry_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
