//! File storage collaborator.
//!
//! Stores uploads, hands out readable handles for downloads, deletes project
//! files and resolves the per-user and per-project directories the pipeline
//! writes into.

pub mod archive;
pub mod local;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Project, User, Workspace};

pub use local::LocalStorage;

/// Errors raised by the storage collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Could not read file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Cannot store '{0}' outside the user directory")]
    OutsideUserDirectory(String),

    #[error("Invalid file name: '{0}'")]
    InvalidName(String),

    #[error("Storage IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name
    pub file_name: String,
    pub content: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read a local file as an upload named after it
    pub async fn from_path(path: &Path) -> Result<Self, StorageError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidName(path.display().to_string()))?;
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok(Self { file_name, content })
    }
}

/// Readable handle to a stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// A file that could not be removed during best-effort cleanup
#[derive(Debug)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub error: StorageError,
}

/// Storage capabilities the pipeline depends on
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create a fresh, uniquely named workspace in the user's directory
    async fn create_workspace(&self, user: &User) -> Result<Workspace, StorageError>;

    /// Write an upload into `dir`, which must lie inside the user's directory
    ///
    /// A same-named file in `dir` is replaced; callers hand each project its own `dir`.
    async fn store_file(&self, user: &User, dir: &Path, upload: &Upload) -> Result<PathBuf, StorageError>;

    /// Resolve a logical name inside `dir`
    async fn load_file_by_name(&self, user: &User, dir: &Path, name: &str) -> Result<StoredFile, StorageError>;

    async fn load_file_by_path(&self, path: &Path) -> Result<StoredFile, StorageError>;

    /// Delete a single file; missing files are not an error
    async fn delete_file(&self, user: &User, path: &Path) -> Result<(), StorageError>;

    /// Delete a directory tree; a missing directory is not an error
    async fn delete_dir(&self, path: &Path) -> Result<(), StorageError>;

    /// Delete every file and directory the project owns, its workspace included,
    /// continuing past failures
    async fn delete_project_files(&self, user: &User, project: &Project) -> Vec<DeletionFailure>;

    /// Directory that holds all of the user's workspaces (created if needed)
    async fn user_root_directory(&self, user: &User) -> Result<PathBuf, StorageError>;

    /// Directory the generated project writes its visualizations to
    fn visualization_directory(&self, project: &Project) -> Option<PathBuf>;
}
