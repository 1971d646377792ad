//! Orchestration core: ports, registry, runtime access and the country-change protocol.

pub mod control;
pub mod country;
pub mod credentials;
pub mod docker;
pub mod error;
pub mod manager;
pub mod naming;
pub mod ports;
pub mod registry;
pub mod runtime;
pub mod spec_builder;

#[cfg(test)]
pub mod testing;

pub use error::{FleetError, Result};
pub use manager::{ContainerView, CreateContainerRequest, CreatedContainer, FleetManager};
