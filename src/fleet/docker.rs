use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerSummary, DeviceMapping, HostConfig, Mount, MountTypeEnum, PortBinding,
    RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum,
};
use bollard::volume::RemoveVolumeOptions;
use std::collections::HashMap;
use tracing::{debug, info};

use super::runtime::{ContainerSpec, RestartPolicy, RuntimeClient, RuntimeContainer, RuntimeError};

const CONNECT_TIMEOUT_SECONDS: u64 = 120;

/// [`RuntimeClient`] backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to `socket`, or the platform default socket when `None`.
    pub fn connect(socket: Option<&str>) -> Result<Self, RuntimeError> {
        let docker = match socket {
            Some(path) => {
                Docker::connect_with_socket(path, CONNECT_TIMEOUT_SECONDS, bollard::API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_socket_defaults(),
        }
        .map_err(|e| RuntimeError::Api(format!("Failed to connect to Docker: {e}")))?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Maps daemon status codes onto the runtime taxonomy.
fn map_error(name: &str, err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError { status_code: 404, .. } => {
            RuntimeError::NotFound(name.to_string())
        }
        DockerError::DockerResponseServerError { status_code: 304, .. } => {
            RuntimeError::AlreadyInState(name.to_string())
        }
        other => RuntimeError::Api(other.to_string()),
    }
}

fn summary_to_container(summary: ContainerSummary) -> Option<RuntimeContainer> {
    let name = summary
        .names
        .as_ref()?
        .first()?
        .trim_start_matches('/')
        .to_string();
    Some(RuntimeContainer {
        id: summary.id.unwrap_or_default(),
        name,
        state: summary.state.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        created: summary.created,
    })
}

fn to_docker_config(spec: &ContainerSpec) -> Config<String> {
    let exposed_ports = spec
        .exposed_ports
        .iter()
        .map(|(port, proto)| (format!("{port}/{}", proto.as_str()), HashMap::new()))
        .collect::<HashMap<_, _>>();

    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for mapping in &spec.port_mappings {
        port_bindings
            .entry(format!("{}/{}", mapping.container_port, mapping.protocol.as_str()))
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(PortBinding {
                host_ip: Some(mapping.host_ip.clone()),
                host_port: Some(mapping.host_port.to_string()),
            });
    }

    let binds = spec
        .binds
        .iter()
        .map(|b| {
            let mode = if b.read_only { ":ro" } else { "" };
            format!("{}:{}{mode}", b.host_path, b.container_path)
        })
        .collect();

    let mounts = spec
        .volumes
        .iter()
        .map(|v| Mount {
            typ: Some(MountTypeEnum::VOLUME),
            source: Some(v.volume.clone()),
            target: Some(v.container_path.clone()),
            ..Default::default()
        })
        .collect();

    let devices = spec
        .devices
        .iter()
        .map(|d| DeviceMapping {
            path_on_host: Some(d.host_path.clone()),
            path_in_container: Some(d.container_path.clone()),
            cgroup_permissions: Some(d.cgroup_permissions.clone()),
        })
        .collect();

    let restart_name = match spec.restart_policy {
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
    };

    Config {
        image: Some(spec.image.clone()),
        hostname: Some(spec.hostname.clone()),
        env: Some(spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            cap_add: Some(spec.capabilities.clone()),
            devices: Some(devices),
            port_bindings: Some(port_bindings),
            binds: Some(binds),
            mounts: Some(mounts),
            restart_policy: Some(DockerRestartPolicy {
                name: Some(restart_name),
                maximum_retry_count: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl RuntimeClient for DockerRuntime {
    async fn list_containers(&self, marker: &str) -> Result<Vec<RuntimeContainer>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![marker.to_string()]);
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;

        Ok(summaries
            .into_iter()
            .filter_map(summary_to_container)
            .filter(|c| c.name.contains(marker))
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), to_docker_config(spec))
            .await
            .map_err(|e| RuntimeError::Api(e.to_string()))?;
        for warning in &response.warnings {
            debug!(name = %spec.name, warning = %warning, "Docker create warning.");
        }
        info!(name = %spec.name, id = %response.id, "Created container.");
        Ok(response.id)
    }

    async fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_error(name, e))
    }

    async fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(name, None::<StopContainerOptions>)
            .await
            .map_err(|e| map_error(name, e))
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(name, None::<RemoveContainerOptions>)
            .await
            .map_err(|e| map_error(name, e))
    }

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_volume(name, None::<RemoveVolumeOptions>)
            .await
            .map_err(|e| map_error(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::spec_builder::{GatewayParams, ImageSettings, build_gateway_spec};
    use std::path::PathBuf;

    #[test]
    fn test_summary_strips_leading_slash() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/gluetun-1".to_string()]),
            state: Some("running".to_string()),
            status: Some("Up 5 minutes".to_string()),
            created: Some(1_700_000_000),
            ..Default::default()
        };
        let container = summary_to_container(summary).unwrap();
        assert_eq!(container.name, "gluetun-1");
        assert!(container.is_running());
        assert_eq!(container.created, Some(1_700_000_000));

        assert!(summary_to_container(ContainerSummary::default()).is_none());
    }

    #[test]
    fn test_error_mapping() {
        let not_found = DockerError::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        };
        assert_eq!(map_error("x", not_found), RuntimeError::NotFound("x".to_string()));

        let not_modified = DockerError::DockerResponseServerError {
            status_code: 304,
            message: String::new(),
        };
        assert_eq!(
            map_error("x", not_modified),
            RuntimeError::AlreadyInState("x".to_string())
        );

        let conflict = DockerError::DockerResponseServerError {
            status_code: 409,
            message: "name in use".to_string(),
        };
        assert!(matches!(map_error("x", conflict), RuntimeError::Api(_)));
    }

    #[test]
    fn test_docker_config_translation() {
        let auth = PathBuf::from("/srv/config/auth.toml");
        let spec = build_gateway_spec(
            &ImageSettings {
                image: "qmcgaw/gluetun".to_string(),
                name_prefix: "gluetun".to_string(),
                vpn_provider: "surfshark".to_string(),
                vpn_type: "wireguard".to_string(),
            },
            &GatewayParams {
                name: "gluetun-1",
                control_port: 33000,
                proxy_port: 34000,
                country: "Spain",
                private_key: "k",
                address: "10.0.0.2/32",
                auth_file: &auth,
            },
        );
        let config = to_docker_config(&spec);
        let host = config.host_config.unwrap();

        let bindings = host.port_bindings.unwrap();
        let control = bindings["8000/tcp"].as_ref().unwrap();
        assert_eq!(control[0].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(control[0].host_port.as_deref(), Some("33000"));
        assert_eq!(
            bindings["8888/tcp"].as_ref().unwrap()[0].host_port.as_deref(),
            Some("34000")
        );

        assert_eq!(
            host.binds.unwrap(),
            vec!["/srv/config/auth.toml:/gluetun/auth/config.toml:ro".to_string()]
        );
        let mount = &host.mounts.unwrap()[0];
        assert_eq!(mount.typ, Some(MountTypeEnum::VOLUME));
        assert_eq!(mount.source.as_deref(), Some("gluetun-data-gluetun-1"));
        assert_eq!(
            host.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED)
        );
        assert_eq!(host.cap_add.unwrap(), vec!["NET_ADMIN".to_string()]);

        let exposed = config.exposed_ports.unwrap();
        assert!(exposed.contains_key("8388/udp"));
        assert!(config.env.unwrap().contains(&"SERVER_COUNTRIES=Spain".to_string()));
    }
}
