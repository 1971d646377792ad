//! The container runtime as seen by the fleet.
//!
//! [`RuntimeClient`] is the only way the fleet touches containers and
//! volumes. The Docker implementation lives in [`super::docker`]; tests swap
//! in an in-memory fake.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Container {0} not found")]
    NotFound(String),
    #[error("Container {0} is already in the requested state")]
    AlreadyInState(String),
    #[error("{0}")]
    Api(String),
}

/// A container as reported live by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContainer {
    pub id: String,
    pub name: String,
    /// Lifecycle state such as `running`, `exited` or `created`.
    pub state: String,
    /// Human readable status, e.g. `Up 2 hours`.
    pub status: String,
    /// Unix seconds.
    pub created: Option<i64>,
}

impl RuntimeContainer {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_ip: String,
    pub host_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBinding {
    pub host_path: String,
    pub container_path: String,
    pub cgroup_permissions: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub volume: String,
    pub container_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    UnlessStopped,
}

/// Everything the runtime needs to instantiate one fleet container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub hostname: String,
    pub image: String,
    pub capabilities: Vec<String>,
    pub devices: Vec<DeviceBinding>,
    /// Exposed but not necessarily published.
    pub exposed_ports: Vec<(u16, Protocol)>,
    pub port_mappings: Vec<PortMapping>,
    pub binds: Vec<BindMount>,
    pub volumes: Vec<VolumeMount>,
    pub restart_policy: RestartPolicy,
    pub env: BTreeMap<String, String>,
}

#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// All containers, running or not, whose name contains `marker`.
    async fn list_containers(&self, marker: &str) -> Result<Vec<RuntimeContainer>, RuntimeError>;

    /// Creates (but does not start) a container and returns its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError>;

    /// Exact-name lookup.
    async fn find_container(&self, name: &str) -> Result<Option<RuntimeContainer>, RuntimeError> {
        Ok(self
            .list_containers(name)
            .await?
            .into_iter()
            .find(|c| c.name == name))
    }
}
