//! In-memory stand-ins for the runtime, control servers, credentials and clock.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use super::control::{ControlApi, ControlError, PublicIpStatus};
use super::country::Sleeper;
use super::credentials::{CredentialProvider, Credentials};
use super::error::Result;
use super::runtime::{ContainerSpec, RuntimeClient, RuntimeContainer, RuntimeError};

#[derive(Default)]
pub struct InstantSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    List,
    Create(String),
    Start(String),
    Stop(String),
    Remove(String),
    RemoveVolume(String),
}

impl RuntimeCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RuntimeCall::List)
    }
}

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<RuntimeContainer>>,
    specs: Mutex<Vec<ContainerSpec>>,
    calls: Mutex<Vec<RuntimeCall>>,
    fail_start: Mutex<Option<RuntimeError>>,
    fail_remove_volume: Mutex<bool>,
}

impl FakeRuntime {
    pub fn with_containers(containers: Vec<RuntimeContainer>) -> Self {
        let runtime = Self::default();
        *runtime.containers.lock().unwrap() = containers;
        runtime
    }

    pub fn fail_start_with(&self, err: RuntimeError) {
        *self.fail_start.lock().unwrap() = Some(err);
    }

    pub fn fail_volume_removal(&self) {
        *self.fail_remove_volume.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn containers(&self) -> Vec<RuntimeContainer> {
        self.containers.lock().unwrap().clone()
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn container(name: &str, state: &str) -> RuntimeContainer {
    RuntimeContainer {
        id: format!("id-{name}"),
        name: name.to_string(),
        state: state.to_string(),
        status: if state == "running" { "Up 1 minute" } else { "Exited (0)" }.to_string(),
        created: Some(1_700_000_000),
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn list_containers(&self, marker: &str) -> std::result::Result<Vec<RuntimeContainer>, RuntimeError> {
        self.record(RuntimeCall::List);
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.name.contains(marker))
            .cloned()
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> std::result::Result<String, RuntimeError> {
        self.record(RuntimeCall::Create(spec.name.clone()));
        let mut containers = self.containers.lock().unwrap();
        if containers.iter().any(|c| c.name == spec.name) {
            return Err(RuntimeError::Api(format!("Conflict. The container name \"/{}\" is already in use", spec.name)));
        }
        let created = container(&spec.name, "created");
        let id = created.id.clone();
        containers.push(created);
        self.specs.lock().unwrap().push(spec.clone());
        Ok(id)
    }

    async fn start_container(&self, name: &str) -> std::result::Result<(), RuntimeError> {
        self.record(RuntimeCall::Start(name.to_string()));
        if let Some(err) = self.fail_start.lock().unwrap().clone() {
            return Err(err);
        }
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        if container.is_running() {
            return Err(RuntimeError::AlreadyInState(name.to_string()));
        }
        container.state = "running".to_string();
        Ok(())
    }

    async fn stop_container(&self, name: &str) -> std::result::Result<(), RuntimeError> {
        self.record(RuntimeCall::Stop(name.to_string()));
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        if !container.is_running() {
            return Err(RuntimeError::AlreadyInState(name.to_string()));
        }
        container.state = "exited".to_string();
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> std::result::Result<(), RuntimeError> {
        self.record(RuntimeCall::Remove(name.to_string()));
        let mut containers = self.containers.lock().unwrap();
        let before = containers.len();
        containers.retain(|c| c.name != name);
        if containers.len() == before {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> std::result::Result<(), RuntimeError> {
        self.record(RuntimeCall::RemoveVolume(name.to_string()));
        if *self.fail_remove_volume.lock().unwrap() {
            return Err(RuntimeError::Api("volume is in use".to_string()));
        }
        Ok(())
    }
}

/// Control servers keyed by control port. Ports without a script are unreachable.
#[derive(Default)]
pub struct FakeControl {
    scripts: Mutex<HashMap<u16, VecDeque<std::result::Result<PublicIpStatus, ControlError>>>>,
    status_calls: Mutex<HashMap<u16, u32>>,
    updates: Mutex<Vec<(u16, Vec<String>)>>,
    reject_updates: Mutex<bool>,
}

pub fn public_ip(addr: &str) -> PublicIpStatus {
    PublicIpStatus {
        public_ip: Some(addr.to_string()),
        ..Default::default()
    }
}

impl FakeControl {
    /// Responses for successive status calls on `port`; the last one repeats.
    pub fn script(&self, port: u16, responses: Vec<std::result::Result<PublicIpStatus, ControlError>>) {
        self.scripts.lock().unwrap().insert(port, responses.into());
    }

    pub fn reject_updates(&self) {
        *self.reject_updates.lock().unwrap() = true;
    }

    pub fn status_calls(&self, port: u16) -> u32 {
        self.status_calls.lock().unwrap().get(&port).copied().unwrap_or(0)
    }

    pub fn updates(&self) -> Vec<(u16, Vec<String>)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlApi for FakeControl {
    async fn public_ip(
        &self,
        control_port: u16,
        _credentials: &Credentials,
    ) -> std::result::Result<PublicIpStatus, ControlError> {
        *self.status_calls.lock().unwrap().entry(control_port).or_default() += 1;
        let mut scripts = self.scripts.lock().unwrap();
        let Some(queue) = scripts.get_mut(&control_port) else {
            return Err(ControlError::Transport("connection refused".to_string()));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Err(ControlError::Timeout))
        } else {
            queue.front().cloned().unwrap_or(Err(ControlError::Timeout))
        }
    }

    async fn update_countries(
        &self,
        control_port: u16,
        _credentials: &Credentials,
        countries: &[String],
    ) -> std::result::Result<(), ControlError> {
        if *self.reject_updates.lock().unwrap() {
            return Err(ControlError::Status {
                status: 401,
                body: "Unauthorized".to_string(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((control_port, countries.to_vec()));
        Ok(())
    }
}

pub struct StaticCredentials {
    pub auth_file: PathBuf,
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self {
            auth_file: PathBuf::from("/srv/fleet/config/auth.toml"),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn ensure_auth_file(&self) -> Result<PathBuf> {
        Ok(self.auth_file.clone())
    }

    async fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            username: "gluetun-user-test".to_string(),
            password: "secret".to_string(),
        })
    }
}
