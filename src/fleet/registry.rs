//! Durable name -> configuration mapping for fleet containers.
//!
//! The whole registry is one JSON document. Every mutation is a full
//! load/modify/save, so all writers go through [`Registry::lock`], which
//! hands out a guard that serializes them. Saves go through a temp file in
//! the same directory and a rename, so readers never observe a torn document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::error::{FleetError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    pub control_port: u16,
    pub proxy_port: u16,
    pub country: String,
    pub private_key: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

pub type RegistryDocument = BTreeMap<String, ContainerConfig>;

#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. A missing file is an empty registry.
    pub async fn load(&self) -> Result<RegistryDocument> {
        match self.raw().await? {
            Some(contents) if contents.trim().is_empty() => Ok(RegistryDocument::new()),
            Some(contents) => Ok(serde_json::from_str(&contents)?),
            None => Ok(RegistryDocument::new()),
        }
    }

    /// The document exactly as stored, or `None` if it does not exist yet.
    pub async fn raw(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FleetError::Registry(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Option<ContainerConfig>> {
        Ok(self.load().await?.remove(name))
    }

    /// Every control and proxy port held by a registry entry.
    pub async fn used_ports(&self) -> Result<Vec<u16>> {
        Ok(used_ports(&self.load().await?))
    }

    /// Enters the write critical section.
    pub async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            registry: self,
            _guard: self.write_lock.lock().await,
        }
    }

    pub async fn remove(&self, name: &str) -> Result<Option<ContainerConfig>> {
        let guard = self.lock().await;
        let mut doc = guard.load().await?;
        let removed = doc.remove(name);
        if removed.is_some() {
            guard.save(&doc).await?;
        }
        Ok(removed)
    }

    pub async fn update_country(&self, name: &str, country: &str) -> Result<()> {
        let guard = self.lock().await;
        let mut doc = guard.load().await?;
        let entry = doc
            .get_mut(name)
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;
        entry.country = country.to_string();
        guard.save(&doc).await
    }
}

pub fn used_ports(doc: &RegistryDocument) -> Vec<u16> {
    doc.values()
        .flat_map(|config| [config.control_port, config.proxy_port])
        .collect()
}

/// Exclusive access to the registry document for one read-modify-write.
pub struct RegistryGuard<'a> {
    registry: &'a Registry,
    _guard: MutexGuard<'a, ()>,
}

impl RegistryGuard<'_> {
    pub async fn load(&self) -> Result<RegistryDocument> {
        self.registry.load().await
    }

    pub async fn save(&self, doc: &RegistryDocument) -> Result<()> {
        let contents = serde_json::to_string_pretty(doc)?;
        let path = self.registry.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, contents.as_bytes()))
            .await
            .map_err(|e| FleetError::Registry(format!("Registry writer task failed: {e}")))??;
        debug!(path = %self.registry.path.display(), entries = doc.len(), "Saved registry.");
        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| FleetError::Registry(format!("Failed to create {}: {e}", dir.display())))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| FleetError::Registry(format!("Failed to create temp file: {e}")))?;
    tmp.write_all(contents)
        .map_err(|e| FleetError::Registry(format!("Failed to write registry: {e}")))?;
    tmp.persist(path)
        .map_err(|e| FleetError::Registry(format!("Failed to replace {}: {e}", path.display())))?;
    Ok(())
}
