//! Client for the control server every gateway container exposes on its
//! loopback control port.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use super::credentials::Credentials;

const PUBLIC_IP_PATH: &str = "/v1/publicip/ip";
const VPN_SETTINGS_PATH: &str = "/v1/vpn/settings";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Request timed out")]
    Timeout,
    #[error("{0}")]
    Transport(String),
    #[error("Control server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ControlError::Timeout
        } else if err.is_decode() {
            ControlError::Decode(err.to_string())
        } else {
            ControlError::Transport(err.to_string())
        }
    }
}

/// Public IP report of a gateway. Fields other than `public_ip` are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PublicIpStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// What a status query yields. An unreachable gateway is data, not a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContainerStatus {
    Available(PublicIpStatus),
    Unavailable { error: String, message: String },
}

impl ContainerStatus {
    pub fn unavailable(message: impl Into<String>) -> Self {
        ContainerStatus::Unavailable {
            error: "Unable to fetch status".to_string(),
            message: message.into(),
        }
    }

    /// The reported public IP, if the gateway answered with one.
    pub fn public_ip(&self) -> Option<&str> {
        match self {
            ContainerStatus::Available(status) => status.public_ip.as_deref().filter(|ip| !ip.is_empty()),
            ContainerStatus::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ContainerStatus::Available(_))
    }
}

#[async_trait]
pub trait ControlApi: Send + Sync {
    async fn public_ip(
        &self,
        control_port: u16,
        credentials: &Credentials,
    ) -> Result<PublicIpStatus, ControlError>;

    /// Asks the VPN client to reconnect to one of `countries`. Success means accepted, not reconnected.
    async fn update_countries(
        &self,
        control_port: u16,
        credentials: &Credentials,
        countries: &[String],
    ) -> Result<(), ControlError>;
}

/// HTTP implementation talking to `http://<host>:<control_port>`.
pub struct HttpControlApi {
    client: Client,
    host: String,
}

impl HttpControlApi {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, ControlError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    fn url(&self, control_port: u16, path: &str) -> String {
        format!("http://{}:{control_port}{path}", self.host)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ControlError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(ControlError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ControlApi for HttpControlApi {
    async fn public_ip(
        &self,
        control_port: u16,
        credentials: &Credentials,
    ) -> Result<PublicIpStatus, ControlError> {
        let response = self
            .client
            .get(self.url(control_port, PUBLIC_IP_PATH))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn update_countries(
        &self,
        control_port: u16,
        credentials: &Credentials,
        countries: &[String],
    ) -> Result<(), ControlError> {
        let body = json!({
            "provider": {
                "server_selection": {
                    "countries": countries,
                }
            }
        });
        let response = self
            .client
            .put(self.url(control_port, VPN_SETTINGS_PATH))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
