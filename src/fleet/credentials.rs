//! Basic-Auth credentials shared by every container's control server.
//!
//! The credentials live in a role file that is bind-mounted read-only into
//! each container; the manager reads the same file to authenticate its own
//! requests.

use async_trait::async_trait;
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info};

use super::error::{FleetError, Result};

pub const AUTH_FILE_NAME: &str = "auth.toml";
const ROLE_NAME: &str = "gluetun-manager";
const PASSWORD_LENGTH: usize = 32;

const ALLOWED_ROUTES: &[&str] = &[
    "GET /v1/vpn/status",
    "PUT /v1/vpn/status",
    "GET /v1/vpn/settings",
    "PUT /v1/vpn/settings",
    "GET /v1/openvpn/status",
    "PUT /v1/openvpn/status",
    "GET /v1/openvpn/settings",
    "GET /v1/openvpn/portforwarded",
    "GET /v1/publicip/ip",
];

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Makes sure the role file exists and returns its host path.
    async fn ensure_auth_file(&self) -> Result<PathBuf>;

    async fn credentials(&self) -> Result<Credentials>;
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct AuthFile {
    #[serde(default)]
    roles: Vec<Role>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Role {
    name: String,
    #[serde(default)]
    routes: Vec<String>,
    auth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

/// Keeps the role file under a config directory, generating it on first use.
pub struct FileCredentialProvider {
    config_dir: PathBuf,
    init_lock: Mutex<()>,
}

impl FileCredentialProvider {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn auth_file_path(&self) -> PathBuf {
        self.config_dir.join(AUTH_FILE_NAME)
    }

    async fn read_existing(path: &Path) -> Option<Credentials> {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        parse_credentials(&contents)
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn ensure_auth_file(&self) -> Result<PathBuf> {
        let _guard = self.init_lock.lock().await;
        let path = self.auth_file_path();
        if Self::read_existing(&path).await.is_some() {
            return Ok(absolute(path).await);
        }

        tokio::fs::create_dir_all(&self.config_dir).await.map_err(|e| {
            FleetError::Credentials(format!(
                "Failed to create config directory {}: {e}",
                self.config_dir.display()
            ))
        })?;

        let credentials = generate_credentials();
        let contents = render_auth_file(&credentials)?;
        tokio::fs::write(&path, contents).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to write auth file.");
            FleetError::Credentials(format!("Failed to write {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), username = %credentials.username, "Generated control API credentials.");

        Ok(absolute(path).await)
    }

    async fn credentials(&self) -> Result<Credentials> {
        self.ensure_auth_file().await?;
        Self::read_existing(&self.auth_file_path())
            .await
            .ok_or_else(|| FleetError::Credentials("Failed to read auth config".to_string()))
    }
}

// Docker needs an absolute source path for bind mounts.
async fn absolute(path: PathBuf) -> PathBuf {
    tokio::fs::canonicalize(&path).await.unwrap_or(path)
}

fn generate_credentials() -> Credentials {
    let username = format!("gluetun-user-{}", hex::encode(rand::random::<[u8; 4]>()));
    let password = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect();
    Credentials { username, password }
}

fn render_auth_file(credentials: &Credentials) -> Result<String> {
    let file = AuthFile {
        roles: vec![Role {
            name: ROLE_NAME.to_string(),
            routes: ALLOWED_ROUTES.iter().map(|r| r.to_string()).collect(),
            auth: "basic".to_string(),
            username: Some(credentials.username.clone()),
            password: Some(credentials.password.clone()),
        }],
    };
    toml::to_string_pretty(&file)
        .map_err(|e| FleetError::Credentials(format!("Failed to render auth file: {e}")))
}

/// First basic-auth role that carries both a username and a password.
fn parse_credentials(contents: &str) -> Option<Credentials> {
    let file: AuthFile = toml::from_str(contents).ok()?;
    file.roles.into_iter().find_map(|role| match (role.username, role.password) {
        (Some(username), Some(password)) if role.auth == "basic" => {
            Some(Credentials { username, password })
        }
        _ => None,
    })
}
