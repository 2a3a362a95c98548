//! JSON file record store.
//!
//! All projects live in one JSON document. Mutations take an exclusive
//! advisory lock on a sidecar `.lock` file, re-read the document, apply the
//! change and atomically replace the file via a temp file in the same
//! directory.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ProjectStore, StoreError};
use crate::domain::{NewProject, Project, ProjectId, UserId};

/// On-disk document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    /// Document format version
    version: u32,

    /// Last id handed out
    next_id: u64,

    projects: Vec<Project>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: 1,
            next_id: 0,
            projects: Vec::new(),
        }
    }
}

/// Record store persisted as `projects.json`
pub struct JsonProjectStore {
    path: PathBuf,

    /// Serializes writers inside this process
    write_lock: Mutex<()>,
}

impl JsonProjectStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_document(&path))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Apply `change` to the current document under both locks
    async fn mutate<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> Result<T, StoreError> + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let lock = open_lock_file(&path)?;
            lock.lock_exclusive()?;

            let result = (|| -> Result<T, StoreError> {
                let mut document = read_document(&path)?;
                let value = change(&mut document)?;
                write_document(&path, &document)?;
                Ok(value)
            })();

            let _ = lock.unlock();
            result
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

fn open_lock_file(path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_path = path.with_extension("json.lock");
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

fn read_document(path: &Path) -> Result<Document, StoreError> {
    if !path.exists() {
        return Ok(Document::default());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Document::default());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_document(path: &Path, document: &Document) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    let content = serde_json::to_string_pretty(document)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl ProjectStore for JsonProjectStore {
    async fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let document = self.load().await?;
        Ok(document.projects.into_iter().find(|p| p.id == id))
    }

    async fn find_by_original_name(&self, name: &str) -> Result<Option<Project>, StoreError> {
        let document = self.load().await?;
        Ok(document
            .projects
            .into_iter()
            .find(|p| p.original.name == name))
    }

    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<Project>, StoreError> {
        let document = self.load().await?;
        Ok(document
            .projects
            .into_iter()
            .filter(|p| p.owner == owner)
            .collect())
    }

    async fn create(&self, project: NewProject) -> Result<Project, StoreError> {
        self.mutate(move |document| {
            document.next_id += 1;
            let project = project.into_project(ProjectId(document.next_id));
            document.projects.push(project.clone());
            Ok(project)
        })
        .await
    }

    async fn save(&self, project: &Project) -> Result<(), StoreError> {
        let project = project.clone();
        self.mutate(move |document| {
            match document.projects.iter_mut().find(|p| p.id == project.id) {
                Some(existing) => {
                    *existing = project;
                    Ok(())
                }
                None => Err(StoreError::Missing(project.id)),
            }
        })
        .await
    }

    async fn delete(&self, id: ProjectId) -> Result<(), StoreError> {
        self.mutate(move |document| {
            document.projects.retain(|p| p.id != id);
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.projects.len())
    }
}
