use std::collections::BTreeMap;
use std::path::Path;

use super::naming::volume_name;
use super::runtime::{
    BindMount, ContainerSpec, DeviceBinding, PortMapping, Protocol, RestartPolicy, VolumeMount,
};

pub const CONTROL_SERVER_PORT: u16 = 8000;
pub const HTTP_PROXY_PORT: u16 = 8888;
pub const SHADOWSOCKS_PORT: u16 = 8388;
pub const AUTH_CONFIG_PATH: &str = "/gluetun/auth/config.toml";
pub const DATA_DIR: &str = "/gluetun";
const TUN_DEVICE: &str = "/dev/net/tun";
const LOOPBACK: &str = "127.0.0.1";

/// Image and VPN client settings shared by every container in the fleet.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub image: String,
    pub name_prefix: String,
    pub vpn_provider: String,
    pub vpn_type: String,
}

/// Per-container inputs.
#[derive(Debug, Clone)]
pub struct GatewayParams<'a> {
    pub name: &'a str,
    pub control_port: u16,
    pub proxy_port: u16,
    pub country: &'a str,
    pub private_key: &'a str,
    pub address: &'a str,
    pub auth_file: &'a Path,
}

pub fn build_gateway_spec(settings: &ImageSettings, params: &GatewayParams<'_>) -> ContainerSpec {
    let mut env = BTreeMap::new();
    let mut set = |key: &str, value: &str| {
        env.insert(key.to_string(), value.to_string());
    };
    set("HTTPPROXY", "on");
    set("HTTP_CONTROL_SERVER_ADDRESS", &format!(":{CONTROL_SERVER_PORT}"));
    set("HTTP_CONTROL_SERVER_AUTH_CONFIG_FILEPATH", AUTH_CONFIG_PATH);
    set("VPN_SERVICE_PROVIDER", &settings.vpn_provider);
    set("VPN_TYPE", &settings.vpn_type);
    set("WIREGUARD_PRIVATE_KEY", params.private_key);
    set("WIREGUARD_ADDRESSES", params.address);
    set("SERVER_COUNTRIES", params.country);
    set("UPDATER_PERIOD", "24h");
    set("DOT", "off");
    set("HEALTH_VPN_DURATION_INITIAL", "30s");

    ContainerSpec {
        name: params.name.to_string(),
        hostname: params.name.to_string(),
        image: settings.image.clone(),
        capabilities: vec!["NET_ADMIN".to_string()],
        devices: vec![DeviceBinding {
            host_path: TUN_DEVICE.to_string(),
            container_path: TUN_DEVICE.to_string(),
            cgroup_permissions: "rwm".to_string(),
        }],
        exposed_ports: vec![
            (CONTROL_SERVER_PORT, Protocol::Tcp),
            (HTTP_PROXY_PORT, Protocol::Tcp),
            (SHADOWSOCKS_PORT, Protocol::Tcp),
            (SHADOWSOCKS_PORT, Protocol::Udp),
        ],
        port_mappings: vec![
            PortMapping {
                container_port: CONTROL_SERVER_PORT,
                protocol: Protocol::Tcp,
                host_ip: LOOPBACK.to_string(),
                host_port: params.control_port,
            },
            PortMapping {
                container_port: HTTP_PROXY_PORT,
                protocol: Protocol::Tcp,
                host_ip: LOOPBACK.to_string(),
                host_port: params.proxy_port,
            },
        ],
        binds: vec![BindMount {
            host_path: params.auth_file.display().to_string(),
            container_path: AUTH_CONFIG_PATH.to_string(),
            read_only: true,
        }],
        volumes: vec![VolumeMount {
            volume: volume_name(&settings.name_prefix, params.name),
            container_path: DATA_DIR.to_string(),
        }],
        restart_policy: RestartPolicy::UnlessStopped,
        env,
    }
}
