//! Storage collaborator used by the render endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;

/// A project that owns uploaded media and rendered output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: Some(Utc::now()),
        }
    }
}

/// Metadata record for an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Name the file was uploaded under
    pub filename: String,
    pub content_type: String,
    /// Blob location; relative paths resolve against the store root
    pub storage_path: String,
    #[serde(default)]
    pub size: u64,
}

/// A file's bytes together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

/// Read access to projects and their media files.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Look up a project; `None` when it does not exist.
    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>>;

    /// Fetch a file's bytes; `None` when no such file exists.
    async fn get_file(&self, id: &str) -> StorageResult<Option<StoredFile>>;
}
