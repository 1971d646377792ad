use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::fleet::FleetError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<FleetError> for AppError {
    fn from(err: FleetError) -> Self {
        let message = err.to_string();
        match err {
            FleetError::Validation(_) => AppError::InvalidInput(message),
            FleetError::NotFound(_) => AppError::NotFound(message),
            FleetError::AlreadyInState(_) => AppError::Conflict(message),
            FleetError::PortInUse { .. }
            | FleetError::RangeExhausted { .. }
            | FleetError::Runtime(_)
            | FleetError::UpstreamUnavailable(_)
            | FleetError::Registry(_)
            | FleetError::Credentials(_) => AppError::InternalServerError(message),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::ports::PortPool;

    #[test]
    fn test_fleet_error_status_codes() {
        let cases = [
            (FleetError::Validation("Country is required".to_string()), StatusCode::BAD_REQUEST),
            (FleetError::NotFound("gluetun-1".to_string()), StatusCode::NOT_FOUND),
            (FleetError::AlreadyInState("gluetun-1".to_string()), StatusCode::CONFLICT),
            (
                FleetError::PortInUse { pool: PortPool::Control, port: 33000 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (FleetError::Runtime("daemon down".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }
}
