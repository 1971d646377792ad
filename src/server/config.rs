use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::fleet::country::ReconnectPolicy;
use crate::fleet::ports::{PortAllocator, PortRange};
use crate::fleet::spec_builder::ImageSettings;

const ENV_PREFIX: &str = "VPNFLEET_";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_address: String,
    pub registry_path: String,
    pub config_dir: String,
    pub log_dir: String,
    pub docker_socket: Option<String>,
    pub image: String,
    pub name_prefix: String,
    pub vpn_provider: String,
    pub vpn_type: String,
    pub control_host: String,
    pub control_port_start: u16,
    pub control_port_end: u16,
    pub proxy_port_start: u16,
    pub proxy_port_end: u16,
    pub status_timeout_seconds: u64,
    pub country_poll_attempts: u32,
    pub country_poll_interval_seconds: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_address: Option<String>,
    registry_path: Option<String>,
    config_dir: Option<String>,
    log_dir: Option<String>,
    docker_socket: Option<String>,
    image: Option<String>,
    name_prefix: Option<String>,
    vpn_provider: Option<String>,
    vpn_type: Option<String>,
    control_host: Option<String>,
    control_port_start: Option<u16>,
    control_port_end: Option<u16>,
    proxy_port_start: Option<u16>,
    proxy_port_end: Option<u16>,
    status_timeout_seconds: Option<u64>,
    country_poll_attempts: Option<u32>,
    country_poll_interval_seconds: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        merge(PartialServerConfig::default(), PartialServerConfig::default())
    }
}

/// Environment values win over file values; anything unset falls back to the default.
fn merge(env: PartialServerConfig, file: PartialServerConfig) -> ServerConfig {
    ServerConfig {
        listen_address: env
            .listen_address
            .or(file.listen_address)
            .unwrap_or_else(|| "0.0.0.0:3030".to_string()),
        registry_path: env
            .registry_path
            .or(file.registry_path)
            .unwrap_or_else(|| "containers.json".to_string()),
        config_dir: env.config_dir.or(file.config_dir).unwrap_or_else(|| "config".to_string()),
        log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(|| "logs".to_string()),
        docker_socket: env.docker_socket.or(file.docker_socket),
        image: env.image.or(file.image).unwrap_or_else(|| "qmcgaw/gluetun".to_string()),
        name_prefix: env.name_prefix.or(file.name_prefix).unwrap_or_else(|| "gluetun".to_string()),
        vpn_provider: env
            .vpn_provider
            .or(file.vpn_provider)
            .unwrap_or_else(|| "surfshark".to_string()),
        vpn_type: env.vpn_type.or(file.vpn_type).unwrap_or_else(|| "wireguard".to_string()),
        control_host: env
            .control_host
            .or(file.control_host)
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        control_port_start: env.control_port_start.or(file.control_port_start).unwrap_or(33000),
        control_port_end: env.control_port_end.or(file.control_port_end).unwrap_or(33100),
        proxy_port_start: env.proxy_port_start.or(file.proxy_port_start).unwrap_or(34000),
        proxy_port_end: env.proxy_port_end.or(file.proxy_port_end).unwrap_or(34100),
        status_timeout_seconds: env
            .status_timeout_seconds
            .or(file.status_timeout_seconds)
            .unwrap_or(5),
        country_poll_attempts: env
            .country_poll_attempts
            .or(file.country_poll_attempts)
            .unwrap_or(10),
        country_poll_interval_seconds: env
            .country_poll_interval_seconds
            .or(file.country_poll_interval_seconds)
            .unwrap_or(2),
    }
}

fn parse_file(contents: &str, path: &Path) -> Result<PartialServerConfig, String> {
    toml::from_str(contents)
        .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
}

impl ServerConfig {
    /// Loads config from an optional TOML file, then `VPNFLEET_*` environment
    /// variables (a `.env` file is honoured), then defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_config = match config_path.map(Path::new) {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                parse_file(&contents, path)?
            }
            _ => PartialServerConfig::default(),
        };

        let env_config: PartialServerConfig = envy::prefixed(ENV_PREFIX)
            .from_env()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        let config = merge(env_config, file_config);
        config.port_allocator()?;
        Ok(config)
    }

    pub fn port_allocator(&self) -> Result<PortAllocator, String> {
        PortAllocator::new(
            PortRange::new(self.control_port_start, self.control_port_end),
            PortRange::new(self.proxy_port_start, self.proxy_port_end),
        )
        .map_err(|e| format!("Invalid port configuration: {e}"))
    }

    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            image: self.image.clone(),
            name_prefix: self.name_prefix.clone(),
            vpn_provider: self.vpn_provider.clone(),
            vpn_type: self.vpn_type.clone(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            attempts: self.country_poll_attempts,
            interval: Duration::from_secs(self.country_poll_interval_seconds),
        }
    }

    /// Never zero, which reqwest would treat as an immediate timeout.
    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_seconds.max(1))
    }
}
