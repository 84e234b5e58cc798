//! Durable client storage for the last activated connector.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Context;
use tracing::debug;

use crate::error::GatewayError;

/// Key/value store that survives restarts.
pub trait ConnectorStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;

    fn remove(&self, key: &str) -> Result<(), GatewayError>;
}

/// In-process storage, mostly for tests and embedders with their own persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectorStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| GatewayError::Storage(format!("Lock poisoned: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| GatewayError::Storage(format!("Lock poisoned: {}", e)))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GatewayError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| GatewayError::Storage(format!("Lock poisoned: {}", e)))?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON file backed storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let entries = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(entries)
    }

    fn store(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing {}", self.path.display()))?;
        debug!("Persisted {} storage entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl ConnectorStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let _guard = self
            .lock
            .read()
            .map_err(|e| GatewayError::Storage(format!("Lock poisoned: {}", e)))?;
        let entries = self.load()?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let _guard = self
            .lock
            .write()
            .map_err(|e| GatewayError::Storage(format!("Lock poisoned: {}", e)))?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GatewayError> {
        let _guard = self
            .lock
            .write()
            .map_err(|e| GatewayError::Storage(format!("Lock poisoned: {}", e)))?;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.store(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CONNECTOR_STORAGE_KEY;
    use uuid::Uuid;

    #[test]
    fn test_memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        storage.set(CONNECTOR_STORAGE_KEY, "injected").unwrap();
        storage.set(CONNECTOR_STORAGE_KEY, "wallet_connect").unwrap();
        assert_eq!(
            storage.get(CONNECTOR_STORAGE_KEY).unwrap().as_deref(),
            Some("wallet_connect")
        );

        storage.remove(CONNECTOR_STORAGE_KEY).unwrap();
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let path = std::env::temp_dir()
            .join(format!("lumanagi-gateway-{}", Uuid::new_v4()))
            .join("storage.json");

        let storage = FileStorage::new(&path);
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());
        storage.set(CONNECTOR_STORAGE_KEY, "injected").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get(CONNECTOR_STORAGE_KEY).unwrap().as_deref(),
            Some("injected")
        );

        reopened.remove(CONNECTOR_STORAGE_KEY).unwrap();
        assert!(storage.get(CONNECTOR_STORAGE_KEY).unwrap().is_none());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_file_storage_reports_corrupt_file() {
        let dir = std::env::temp_dir().join(format!("lumanagi-gateway-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(
            storage.get(CONNECTOR_STORAGE_KEY),
            Err(GatewayError::Other(_))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }
}
