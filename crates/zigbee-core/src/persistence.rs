//! State persistence adapter: save/restore hooks invoked on mutations
//! and lifecycle boundaries
//!
//! The on-disk format is opaque to the core; `JsonFileAdapter` is the
//! default, a load-or-default JSON file with atomic write-then-rename.

use crate::model::NetworkSnapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn deserialize(&self) -> NetworkSnapshot;
    async fn serialize(&self, snapshot: &NetworkSnapshot);
}

/// Loads/saves a [`NetworkSnapshot`] as pretty JSON, writing atomically
/// via a temp file plus rename.
pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PersistenceAdapter for JsonFileAdapter {
    async fn deserialize(&self) -> NetworkSnapshot {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => match serde_json::from_str::<NetworkSnapshot>(&contents) {
                Ok(snapshot) => {
                    tracing::info!(
                        path = %self.path.display(),
                        nodes = snapshot.nodes.len(),
                        devices = snapshot.devices.len(),
                        groups = snapshot.groups.len(),
                        "restored network snapshot"
                    );
                    snapshot
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to parse network snapshot");
                    NetworkSnapshot::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no network snapshot found, starting fresh");
                NetworkSnapshot::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read network snapshot");
                NetworkSnapshot::default()
            }
        }
    }

    async fn serialize(&self, snapshot: &NetworkSnapshot) {
        if let Err(e) = save_atomically(&self.path, snapshot).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to save network snapshot");
            return;
        }
        tracing::debug!(
            path = %self.path.display(),
            nodes = snapshot.nodes.len(),
            devices = snapshot.devices.len(),
            groups = snapshot.groups.len(),
            "saved network snapshot"
        );
    }
}

async fn save_atomically(path: &Path, snapshot: &NetworkSnapshot) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{DeviceAddress, IeeeAddress, NetworkAddress};
    use crate::model::{Device, DeviceRole, Node};

    #[tokio::test]
    async fn missing_file_yields_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path().join("missing.json"));
        let snapshot = adapter.deserialize().await;
        assert!(snapshot.nodes.is_empty());
    }

    #[tokio::test]
    async fn round_trips_a_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = JsonFileAdapter::new(dir.path().join("net.json"));

        let snapshot = NetworkSnapshot {
            nodes: vec![Node::new(
                NetworkAddress(1),
                IeeeAddress([1; 8]),
                DeviceRole::Router,
            )],
            devices: vec![Device::new(DeviceAddress::new(1, 1), IeeeAddress([1; 8]))],
            groups: vec![],
        };

        adapter.serialize(&snapshot).await;
        let restored = adapter.deserialize().await;
        assert_eq!(restored.nodes.len(), 1);
        assert_eq!(restored.devices.len(), 1);
    }
}
