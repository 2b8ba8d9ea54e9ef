//! Storage for paired controllers

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Controller permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Regular user
    User,
    /// May add, remove and list pairings
    Admin,
}

impl Permission {
    /// Decode the TLV `Permissions` byte
    #[must_use]
    pub fn from_byte(b: u8) -> Self {
        if b & 0x01 == 0x01 {
            Self::Admin
        } else {
            Self::User
        }
    }

    /// TLV `Permissions` byte
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::User => 0,
            Self::Admin => 1,
        }
    }
}

/// A paired controller record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedController {
    /// Controller pairing identifier
    pub username: String,
    /// Controller long-term Ed25519 public key
    pub public_key: [u8; 32],
    /// Permission level
    pub permission: Permission,
}

impl PairedController {
    /// Whether this controller has admin permission
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.permission == Permission::Admin
    }
}

/// Abstract storage interface for paired controllers
#[async_trait]
pub trait PairingStorage: Send + Sync {
    /// Load a controller by pairing identifier
    async fn load(&self, username: &str) -> Option<PairedController>;

    /// Insert or replace a controller
    ///
    /// # Errors
    ///
    /// Returns error if storage fails
    async fn save(&mut self, controller: &PairedController) -> Result<(), StorageError>;

    /// Remove a controller
    ///
    /// # Errors
    ///
    /// Returns error if removal fails
    async fn remove(&mut self, username: &str) -> Result<(), StorageError>;

    /// List all paired controllers
    async fn list(&self) -> Vec<PairedController>;

    /// Whether at least one controller is paired
    async fn is_paired(&self) -> bool {
        !self.list().await.is_empty()
    }

    /// Whether `username` is a paired admin
    async fn is_admin(&self, username: &str) -> bool {
        self.load(username)
            .await
            .is_some_and(|controller| controller.is_admin())
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// In-memory pairing storage (non-persistent)
#[derive(Debug, Default)]
pub struct MemoryStorage {
    controllers: BTreeMap<String, PairedController>,
}

impl MemoryStorage {
    /// Create a new in-memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PairingStorage for MemoryStorage {
    async fn load(&self, username: &str) -> Option<PairedController> {
        self.controllers.get(username).cloned()
    }

    async fn save(&mut self, controller: &PairedController) -> Result<(), StorageError> {
        self.controllers
            .insert(controller.username.clone(), controller.clone());
        Ok(())
    }

    async fn remove(&mut self, username: &str) -> Result<(), StorageError> {
        self.controllers.remove(username);
        Ok(())
    }

    async fn list(&self) -> Vec<PairedController> {
        self.controllers.values().cloned().collect()
    }
}

/// JSON file backed pairing storage
pub struct FileStorage {
    path: std::path::PathBuf,
    cache: BTreeMap<String, PairedController>,
}

impl FileStorage {
    /// Open file storage at the given path, loading existing records
    ///
    /// # Errors
    ///
    /// Returns error if directory cannot be created or file loaded
    pub async fn new(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cache = Self::load_all(&path).await?;
        tracing::debug!(path = %path.display(), records = cache.len(), "Loaded pairing store");

        Ok(Self { path, cache })
    }

    async fn load_all(
        path: &std::path::Path,
    ) -> Result<BTreeMap<String, PairedController>, StorageError> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(BTreeMap::new());
        }

        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }

        let cache = tokio::task::spawn_blocking(move || serde_json::from_slice(&bytes))
            .await
            .map_err(|e| StorageError::Serialization(format!("Deserialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        Ok(cache)
    }

    /// Persist `records`, adopting them as the cache only once they are on disk
    async fn commit(
        &mut self,
        records: BTreeMap<String, PairedController>,
    ) -> Result<(), StorageError> {
        let path = self.path.clone();
        let staged = records.clone();

        let bytes = tokio::task::spawn_blocking(move || serde_json::to_vec_pretty(&staged))
            .await
            .map_err(|e| StorageError::Serialization(format!("Serialization task failed: {e}")))?
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            tracing::warn!(path = %path.display(), "Pairing store write failed: {}", e);
            return Err(e.into());
        }

        self.cache = records;
        Ok(())
    }
}

#[async_trait]
impl PairingStorage for FileStorage {
    async fn load(&self, username: &str) -> Option<PairedController> {
        self.cache.get(username).cloned()
    }

    async fn save(&mut self, controller: &PairedController) -> Result<(), StorageError> {
        let mut records = self.cache.clone();
        records.insert(controller.username.clone(), controller.clone());
        self.commit(records).await
    }

    async fn remove(&mut self, username: &str) -> Result<(), StorageError> {
        if !self.cache.contains_key(username) {
            return Ok(());
        }
        let mut records = self.cache.clone();
        records.remove(username);
        self.commit(records).await
    }

    async fn list(&self) -> Vec<PairedController> {
        self.cache.values().cloned().collect()
    }
}
