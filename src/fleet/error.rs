use thiserror::Error;

use super::ports::PortPool;
use super::runtime::RuntimeError;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("{0}")]
    Validation(String),
    #[error("{} port {port} is already in use", .pool.label())]
    PortInUse { pool: PortPool, port: u16 },
    #[error("Container {0} not found")]
    NotFound(String),
    #[error("No available {pool} ports in range {start}-{end}")]
    RangeExhausted { pool: PortPool, start: u16, end: u16 },
    #[error("Container {0} is already in the requested state")]
    AlreadyInState(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Control API unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Credential error: {0}")]
    Credentials(String),
}

impl From<RuntimeError> for FleetError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(name) => FleetError::NotFound(name),
            RuntimeError::AlreadyInState(name) => FleetError::AlreadyInState(name),
            RuntimeError::Api(msg) => FleetError::Runtime(msg),
        }
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::Registry(format!("JSON serialization/deserialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
