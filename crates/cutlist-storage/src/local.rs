//! Filesystem-backed store.
//!
//! Layout under the root:
//! - `projects/{id}.json` project records
//! - `files/{id}.json` file records pointing at a blob
//! - `blobs/{id}` blobs written by [`LocalStore::put_file`]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{FileRecord, MediaStore, Project, StoredFile};

/// Configuration for the local store.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    pub root: PathBuf,
}

impl LocalStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
        }
    }
}

/// Project and file store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(config: LocalStoreConfig) -> Self {
        Self { root: config.root }
    }

    /// Create a store from environment variables.
    pub fn from_env() -> Self {
        Self::new(LocalStoreConfig::from_env())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_path(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join("projects").join(format!("{}.json", id)))
    }

    fn record_path(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join("files").join(format!("{}.json", id)))
    }

    fn resolve_blob(&self, storage_path: &str) -> PathBuf {
        let path = Path::new(storage_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Write a project record.
    pub async fn put_project(&self, project: &Project) -> StorageResult<()> {
        let path = self.project_path(&project.id)?;
        write_json(&path, project).await?;
        info!("Stored project {}", project.id);
        Ok(())
    }

    /// Store a blob and its record.
    pub async fn put_file(
        &self,
        id: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> StorageResult<FileRecord> {
        let record_path = self.record_path(id)?;
        let storage_path = format!("blobs/{}", id);
        let blob_path = self.resolve_blob(&storage_path);
        if let Some(parent) = blob_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&blob_path, bytes).await?;

        let record = FileRecord {
            id: id.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            storage_path,
            size: bytes.len() as u64,
        };
        write_json(&record_path, &record).await?;
        info!("Stored file {} ({} bytes)", id, bytes.len());
        Ok(record)
    }

    /// Read a file record without its blob.
    pub async fn get_record(&self, id: &str) -> StorageResult<Option<FileRecord>> {
        let path = self.record_path(id)?;
        read_json(&path).await
    }
}

#[async_trait]
impl MediaStore for LocalStore {
    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>> {
        let path = self.project_path(id)?;
        debug!("Loading project {}", id);
        read_json(&path).await
    }

    async fn get_file(&self, id: &str) -> StorageResult<Option<StoredFile>> {
        let Some(record) = self.get_record(id).await? else {
            return Ok(None);
        };

        let blob = self.resolve_blob(&record.storage_path);
        debug!("Reading file {} from {}", id, blob.display());
        let bytes = match tokio::fs::read(&blob).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::CorruptRecord {
                    key: id.to_string(),
                    message: format!("blob {} is missing", record.storage_path),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(StoredFile {
            bytes,
            content_type: record.content_type,
            filename: record.filename,
        }))
    }
}

/// Ids become file names, so path syntax is refused.
fn validate_id(id: &str) -> StorageResult<()> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::invalid_key(id))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_vec_pretty(value)?).await?;
    Ok(())
}
