use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::control::{ContainerStatus, ControlApi};
use super::country::{CountryChange, ReconnectPolicy, Sleeper, TokioSleeper, verify_reconnection};
use super::credentials::CredentialProvider;
use super::error::{FleetError, Result};
use super::naming::{next_container_name, volume_name};
use super::ports::{PortAllocator, PortPair, PortPool};
use super::registry::{ContainerConfig, Registry, used_ports};
use super::runtime::RuntimeClient;
use super::spec_builder::{GatewayParams, ImageSettings, build_gateway_spec};

/// A runtime container merged with its registry entry, if it has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub name: String,
    pub id: String,
    pub state: String,
    pub status: String,
    pub control_port: Option<u16>,
    pub proxy_port: Option<u16>,
    pub country: Option<String>,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerRequest {
    pub name: Option<String>,
    pub private_key: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub control_port: Option<u16>,
    pub proxy_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedContainer {
    pub id: String,
    pub name: String,
    pub control_port: u16,
    pub proxy_port: u16,
}

/// Checked create request.
struct NewGateway {
    name: String,
    private_key: String,
    address: String,
    country: String,
    control_port: u16,
    proxy_port: u16,
}

/// Names shadowed by static routes under `/api/containers/`.
const RESERVED_NAMES: &[&str] = &["status"];

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct FleetManager {
    settings: ImageSettings,
    ports: PortAllocator,
    registry: Registry,
    runtime: Arc<dyn RuntimeClient>,
    control: Arc<dyn ControlApi>,
    credentials: Arc<dyn CredentialProvider>,
    reconnect: ReconnectPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FleetManager {
    pub fn new(
        settings: ImageSettings,
        ports: PortAllocator,
        registry: Registry,
        runtime: Arc<dyn RuntimeClient>,
        control: Arc<dyn ControlApi>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            settings,
            ports,
            registry,
            runtime,
            control,
            credentials,
            reconnect: ReconnectPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fleet containers known to the runtime, merged with their registry entries.
    ///
    /// Runtime containers without an entry are listed with empty config
    /// fields. Registry entries without a runtime container are left out.
    pub async fn list_containers(&self) -> Result<Vec<ContainerView>> {
        let configs = self.registry.load().await?;
        let containers = self.runtime.list_containers(&self.settings.name_prefix).await?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let config = configs.get(&c.name);
                ContainerView {
                    control_port: config.map(|cfg| cfg.control_port),
                    proxy_port: config.map(|cfg| cfg.proxy_port),
                    country: config.map(|cfg| cfg.country.clone()),
                    name: c.name,
                    id: c.id,
                    state: c.state,
                    status: c.status,
                    created: c.created,
                }
            })
            .collect())
    }

    pub async fn next_container_name(&self) -> Result<String> {
        let containers = self.runtime.list_containers(&self.settings.name_prefix).await?;
        Ok(next_container_name(
            &self.settings.name_prefix,
            containers.iter().map(|c| c.name.as_str()),
        ))
    }

    pub async fn available_ports(&self) -> Result<PortPair> {
        let used = self.registry.used_ports().await?;
        self.ports.next_pair(&used)
    }

    fn validate_create(&self, request: &CreateContainerRequest) -> Result<NewGateway> {
        let (Some(name), Some(private_key), Some(address), Some(country)) = (
            required(&request.name),
            required(&request.private_key),
            required(&request.address),
            required(&request.country),
        ) else {
            return Err(FleetError::Validation(
                "Missing required fields: name, privateKey, address, country".to_string(),
            ));
        };

        if RESERVED_NAMES.contains(&name) {
            return Err(FleetError::Validation(format!(
                "Container name '{name}' is reserved"
            )));
        }

        let control_port = request.control_port.ok_or_else(|| {
            FleetError::Validation("Missing required field: controlPort".to_string())
        })?;
        let proxy_port = request.proxy_port.ok_or_else(|| {
            FleetError::Validation("Missing required field: proxyPort".to_string())
        })?;
        self.ports.validate(PortPool::Control, control_port)?;
        self.ports.validate(PortPool::Proxy, proxy_port)?;

        Ok(NewGateway {
            name: name.to_string(),
            private_key: private_key.to_string(),
            address: address.to_string(),
            country: country.to_string(),
            control_port,
            proxy_port,
        })
    }

    /// Creates and starts a gateway, then records it.
    ///
    /// The registry lock is held from the port collision check until the new
    /// entry is saved, so concurrent creates cannot claim the same port. If
    /// the container fails to start it is removed and nothing is recorded.
    pub async fn create_container(&self, request: CreateContainerRequest) -> Result<CreatedContainer> {
        let gateway = self.validate_create(&request)?;
        let auth_file = self.credentials.ensure_auth_file().await?;

        let guard = self.registry.lock().await;
        let mut doc = guard.load().await?;
        let used = used_ports(&doc);
        if used.contains(&gateway.control_port) {
            return Err(FleetError::PortInUse {
                pool: PortPool::Control,
                port: gateway.control_port,
            });
        }
        if used.contains(&gateway.proxy_port) {
            return Err(FleetError::PortInUse {
                pool: PortPool::Proxy,
                port: gateway.proxy_port,
            });
        }

        let spec = build_gateway_spec(
            &self.settings,
            &GatewayParams {
                name: &gateway.name,
                control_port: gateway.control_port,
                proxy_port: gateway.proxy_port,
                country: &gateway.country,
                private_key: &gateway.private_key,
                address: &gateway.address,
                auth_file: &auth_file,
            },
        );
        let id = self.runtime.create_container(&spec).await?;

        if let Err(start_err) = self.runtime.start_container(&gateway.name).await {
            error!(name = %gateway.name, error = %start_err, "Container failed to start, removing it.");
            if let Err(cleanup_err) = self.runtime.remove_container(&gateway.name).await {
                error!(
                    name = %gateway.name,
                    error = %cleanup_err,
                    "Failed to cleanup container after start failure."
                );
            }
            return Err(start_err.into());
        }

        doc.insert(
            gateway.name.clone(),
            ContainerConfig {
                control_port: gateway.control_port,
                proxy_port: gateway.proxy_port,
                country: gateway.country.clone(),
                private_key: gateway.private_key,
                address: gateway.address,
                created_at: Utc::now(),
            },
        );
        guard.save(&doc).await?;
        info!(
            name = %gateway.name,
            control_port = gateway.control_port,
            proxy_port = gateway.proxy_port,
            country = %gateway.country,
            "Container created and started."
        );

        Ok(CreatedContainer {
            id,
            name: gateway.name,
            control_port: gateway.control_port,
            proxy_port: gateway.proxy_port,
        })
    }

    /// Stops (if running) and removes a container, its data volume, and its registry entry.
    pub async fn delete_container(&self, name: &str) -> Result<()> {
        let container = self
            .runtime
            .find_container(name)
            .await?
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;

        if container.is_running() {
            self.runtime.stop_container(name).await?;
        }
        self.runtime.remove_container(name).await?;

        let volume = volume_name(&self.settings.name_prefix, name);
        match self.runtime.remove_volume(&volume).await {
            Ok(()) => info!(volume = %volume, "Removed volume."),
            Err(e) => warn!(volume = %volume, error = %e, "Failed to remove volume."),
        }

        self.registry.remove(name).await?;
        info!(name = %name, "Container deleted.");
        Ok(())
    }

    pub async fn start_container(&self, name: &str) -> Result<()> {
        self.runtime.start_container(name).await?;
        info!(name = %name, "Container started.");
        Ok(())
    }

    pub async fn stop_container(&self, name: &str) -> Result<()> {
        self.runtime.stop_container(name).await?;
        info!(name = %name, "Container stopped.");
        Ok(())
    }

    /// Live status from the container's control server. Only an unknown name is an error.
    pub async fn container_status(&self, name: &str) -> Result<ContainerStatus> {
        let config = self
            .registry
            .get(name)
            .await?
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;
        Ok(self.fetch_status(name, &config).await)
    }

    /// Status of every registered container, fetched concurrently.
    pub async fn all_statuses(&self) -> Result<BTreeMap<String, ContainerStatus>> {
        let configs = self.registry.load().await?;
        let statuses = join_all(
            configs
                .iter()
                .map(|(name, config)| async move { (name.clone(), self.fetch_status(name, config).await) }),
        )
        .await;
        Ok(statuses.into_iter().collect())
    }

    async fn fetch_status(&self, name: &str, config: &ContainerConfig) -> ContainerStatus {
        let credentials = match self.credentials.credentials().await {
            Ok(credentials) => credentials,
            Err(e) => return ContainerStatus::unavailable(e.to_string()),
        };
        match self.control.public_ip(config.control_port, &credentials).await {
            Ok(status) => ContainerStatus::Available(status),
            Err(e) => {
                warn!(name = %name, control_port = config.control_port, error = %e, "Control API unavailable.");
                ContainerStatus::unavailable(e.to_string())
            }
        }
    }

    /// Switches a gateway to `country` and waits (bounded) for it to come back with a new IP.
    ///
    /// The registry is updated as soon as the control server accepts the
    /// change, before verification starts.
    pub async fn change_country(&self, name: &str, country: &str) -> Result<CountryChange> {
        let country = country.trim();
        if country.is_empty() {
            return Err(FleetError::Validation("Country is required".to_string()));
        }
        let config = self
            .registry
            .get(name)
            .await?
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;

        let before = self.fetch_status(name, &config).await;
        let old_ip = before.public_ip().map(str::to_string);

        let credentials = self.credentials.credentials().await?;
        self.control
            .update_countries(config.control_port, &credentials, &[country.to_lowercase()])
            .await
            .map_err(|e| FleetError::UpstreamUnavailable(e.to_string()))?;
        self.registry.update_country(name, country).await?;
        info!(name = %name, country = %country, old_ip = ?old_ip, "Country change accepted, verifying reconnection.");

        Ok(verify_reconnection(&self.reconnect, self.sleeper.as_ref(), old_ip.as_deref(), || {
            self.fetch_status(name, &config)
        })
        .await)
    }

    /// The registry document as stored, if any.
    pub async fn registry_document(&self) -> Result<Option<String>> {
        self.registry.raw().await
    }
}
