//! Snapshot persistence
//!
//! Stores a single serializable value as a versioned, checksummed JSON document.
//! Writes go through a temp file and a rename so a crash never leaves a
//! half-written snapshot behind.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Persistence error types
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corruption detected
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionedSnapshot<T> {
    version: u32,
    checksum: String,
    data: T,
}

fn checksum_of<T: Serialize>(data: &T) -> Result<String> {
    let json = serde_json::to_string(data)?;
    Ok(format!("{:x}", md5::compute(json)))
}

impl<T: Serialize> VersionedSnapshot<T> {
    fn new(version: u32, data: T) -> Result<Self> {
        let checksum = checksum_of(&data)?;
        Ok(Self { version, checksum, data })
    }

    fn verify_checksum(&self) -> Result<()> {
        let computed = checksum_of(&self.data)?;
        if computed != self.checksum {
            return Err(PersistenceError::Corruption(format!(
                "Checksum mismatch: expected {}, got {}",
                self.checksum, computed
            )));
        }
        Ok(())
    }
}

/// Persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Path to the snapshot file
    pub path: PathBuf,
    /// Current schema version
    pub version: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state.json"),
            version: 1,
        }
    }
}

impl PersistenceConfig {
    /// Create a new configuration
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set schema version
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// A typed snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotFile<T> {
    config: PersistenceConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SnapshotFile<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a handle for the configured path; nothing is read yet
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config, _marker: PhantomData }
    }

    /// Path of the snapshot
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Load the snapshot. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<T>> {
        let contents = match fs::read_to_string(&self.config.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot: VersionedSnapshot<T> = serde_json::from_str(&contents)?;
        snapshot.verify_checksum()?;

        if snapshot.version != self.config.version {
            return Err(PersistenceError::VersionMismatch {
                expected: self.config.version,
                found: snapshot.version,
            });
        }

        Ok(Some(snapshot.data))
    }

    /// Write the snapshot
    pub async fn save(&self, data: &T) -> Result<()> {
        let snapshot = VersionedSnapshot::new(self.config.version, data)?;
        let json = serde_json::to_string_pretty(&snapshot)?;
        self.write_atomic(&json).await
    }

    async fn write_atomic(&self, contents: &str) -> Result<()> {
        let temp_path = self.config.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.config.path).await?;
        tracing::debug!(path = %self.config.path.display(), "Snapshot written");

        Ok(())
    }
}
