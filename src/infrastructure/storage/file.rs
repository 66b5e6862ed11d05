//! File-backed storage implementation
//!
//! One JSON document per key under the cache directory. Values are stored
//! hex-encoded, timestamps as ISO-8601 strings and the context as a JSON
//! string. Keys made only of `[A-Za-z0-9_-]` are used as file names directly;
//! any other key is stored under the hex SHA-256 of the key.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::cache::{CacheContext, CacheEntry};
use crate::domain::storage::CacheStorage;
use crate::domain::DomainError;

const ENTRY_EXTENSION: &str = "json";
const MAX_PLAIN_FILE_STEM: usize = 128;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    key: String,
    value: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ttl_seconds: Option<u64>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    access_count: u64,
    #[serde(default)]
    last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    normalized_query: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    context: Option<String>,
}

impl PersistedEntry {
    fn from_entry(entry: &CacheEntry) -> Result<Self, DomainError> {
        let context = entry
            .context()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            key: entry.key().to_string(),
            value: hex::encode(entry.value()),
            created_at: entry.created_at(),
            expires_at: entry.expires_at(),
            ttl_seconds: entry.ttl_seconds(),
            embedding: entry.embedding().map(<[f32]>::to_vec),
            access_count: entry.access_count(),
            last_accessed_at: entry.metadata().last_accessed_at(),
            normalized_query: entry.metadata().normalized_query().map(str::to_string),
            tags: entry.metadata().tags().clone(),
            context,
        })
    }

    fn value_len(&self) -> u64 {
        (self.value.len() / 2) as u64
    }

    fn into_entry(self) -> Result<CacheEntry, DomainError> {
        let value = hex::decode(&self.value).map_err(|e| {
            DomainError::storage(format!("Corrupt value for '{}': {}", self.key, e))
        })?;

        let mut entry = CacheEntry::new(self.key, value, self.created_at)?
            .with_access_stats(self.access_count, self.last_accessed_at);

        entry = match (self.ttl_seconds, self.expires_at) {
            (Some(ttl), Some(expires_at)) => entry.with_renewed_expiry(ttl, expires_at)?,
            (None, Some(expires_at)) => entry.with_expires_at(expires_at)?,
            (Some(ttl), None) => entry.with_ttl(ttl)?,
            (None, None) => entry,
        };

        if let Some(embedding) = self.embedding {
            entry = entry.with_embedding(embedding);
        }

        if let Some(normalized_query) = self.normalized_query {
            entry = entry.with_normalized_query(normalized_query);
        }

        for (name, value) in self.tags {
            entry = entry.with_tag(name, value);
        }

        if let Some(context) = self.context {
            let context: CacheContext = serde_json::from_str(&context)?;
            entry = entry.with_context(context);
        }

        Ok(entry)
    }
}

/// Entry store keeping one file per key in a directory
#[derive(Debug, Clone)]
pub struct FileCacheStorage {
    directory: PathBuf,
}

impl FileCacheStorage {
    /// Opens (creating if needed) the cache directory
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let directory = directory.into();

        fs::create_dir_all(&directory).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create cache directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        debug!(directory = %directory.display(), "Opened file cache storage");

        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let plain = !key.is_empty()
            && key.len() <= MAX_PLAIN_FILE_STEM
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        let stem = if plain {
            key.to_string()
        } else {
            hex::encode(Sha256::digest(key.as_bytes()))
        };

        self.directory.join(format!("{}.{}", stem, ENTRY_EXTENSION))
    }

    async fn read_persisted(&self, path: &Path) -> Result<Option<PersistedEntry>, DomainError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let persisted = serde_json::from_slice(&bytes).map_err(|e| {
            DomainError::storage(format!("Corrupt cache file {}: {}", path.display(), e))
        })?;

        Ok(Some(persisted))
    }

    async fn entry_paths(&self) -> Result<Vec<PathBuf>, DomainError> {
        let mut dir = fs::read_dir(&self.directory).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to list {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        let mut paths = Vec::new();

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list cache directory: {}", e)))?
        {
            let path = item.path();

            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                paths.push(path);
            }
        }

        Ok(paths)
    }

    /// Every readable persisted entry; unreadable files are skipped with a warning
    async fn scan(&self) -> Result<Vec<PersistedEntry>, DomainError> {
        let mut entries = Vec::new();

        for path in self.entry_paths().await? {
            match self.read_persisted(&path).await {
                Ok(Some(persisted)) => entries.push(persisted),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable cache file"),
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl CacheStorage for FileCacheStorage {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        let persisted = self.read_persisted(&self.path_for(key)).await?;

        match persisted {
            Some(persisted) if persisted.key == key => persisted.into_entry().map(Some),
            Some(_) | None => Ok(None),
        }
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), DomainError> {
        let path = self.path_for(entry.key());
        let persisted = PersistedEntry::from_entry(&entry)?;
        let bytes = serde_json::to_vec(&persisted)?;

        let tmp_path = path.with_extension("tmp");

        fs::write(&tmp_path, &bytes).await.map_err(|e| {
            DomainError::storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;

        fs::rename(&tmp_path, &path).await.map_err(|e| {
            DomainError::storage(format!("Failed to move {} into place: {}", path.display(), e))
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let path = self.path_for(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        fs::try_exists(self.path_for(key))
            .await
            .map_err(|e| DomainError::storage(format!("Failed to stat '{}': {}", key, e)))
    }

    async fn all_keys(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.scan().await?.into_iter().map(|p| p.key).collect())
    }

    async fn size_bytes(&self) -> Result<u64, DomainError> {
        Ok(self.scan().await?.iter().map(PersistedEntry::value_len).sum())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        for path in self.entry_paths().await? {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(DomainError::storage(format!(
                        "Failed to delete {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Ok(())
    }
}
