//! Project and media file storage.
//!
//! This crate provides:
//! - The `MediaStore` trait the render endpoint reads through
//! - A filesystem-backed `LocalStore`

pub mod error;
pub mod local;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use local::{LocalStore, LocalStoreConfig};
pub use store::{FileRecord, MediaStore, Project, StoredFile};
