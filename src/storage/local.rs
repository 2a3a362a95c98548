//! Local filesystem storage.
//!
//! Layout: `<root>/<user name>/<workspace>/...` for everything a project
//! owns (see [`Workspace`]), `<generated project>/<visualization subdir>/`
//! for rendered images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::{DeletionFailure, Storage, StorageError, StoredFile, Upload};
use crate::domain::{Project, User, Workspace};

/// Storage rooted at a directory on the local disk
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    visualization_subdir: PathBuf,
}

impl LocalStorage {
    /// Create storage under `root`; relative roots resolve against the current directory
    pub fn new(root: impl Into<PathBuf>, visualization_subdir: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&root))
                .unwrap_or(root)
        };
        Self {
            root,
            visualization_subdir: visualization_subdir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user: &User) -> Result<PathBuf, StorageError> {
        let name = single_component(&user.name)
            .ok_or_else(|| StorageError::InvalidName(user.name.clone()))?;
        Ok(self.root.join(name))
    }

    /// `dir` itself if it lies strictly inside the user's directory
    fn user_subdir<'a>(&self, user: &User, dir: &'a Path) -> Result<&'a Path, StorageError> {
        let user_dir = self.user_dir(user)?;
        let inside = dir.starts_with(&user_dir)
            && dir != user_dir.as_path()
            && dir
                .components()
                .all(|c| !matches!(c, Component::ParentDir));
        if inside {
            Ok(dir)
        } else {
            Err(StorageError::OutsideUserDirectory(dir.display().to_string()))
        }
    }
}

/// Accept only a plain file name (no separators, no `..`)
fn single_component(name: &str) -> Option<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}

async fn stat_file(path: &Path) -> Result<StoredFile, StorageError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|_| StorageError::NotFound(path.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(StorageError::NotFound(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(StoredFile {
        name,
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
    })
}

#[async_trait]
impl Storage for LocalStorage {
    async fn create_workspace(&self, user: &User) -> Result<Workspace, StorageError> {
        let user_dir = self.user_root_directory(user).await?;
        let workspace = Workspace::new(user_dir.join(Uuid::new_v4().simple().to_string()));

        fs::create_dir(workspace.root())
            .await
            .map_err(|e| StorageError::io(workspace.root(), e))?;
        for dir in workspace.subdirs() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StorageError::io(&dir, e))?;
        }

        debug!(path = %workspace.root().display(), "Created workspace");
        Ok(workspace)
    }

    async fn store_file(&self, user: &User, dir: &Path, upload: &Upload) -> Result<PathBuf, StorageError> {
        if upload.file_name.trim().is_empty() {
            return Err(StorageError::InvalidName(upload.file_name.clone()));
        }
        let name = single_component(&upload.file_name)
            .ok_or_else(|| StorageError::OutsideUserDirectory(upload.file_name.clone()))?;
        let dir = self.user_subdir(user, dir)?;

        fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::io(dir, e))?;
        let destination = dir.join(name);
        fs::write(&destination, &upload.content)
            .await
            .map_err(|e| StorageError::io(&destination, e))?;

        debug!(path = %destination.display(), bytes = upload.content.len(), "Stored upload");
        Ok(destination)
    }

    async fn load_file_by_name(&self, user: &User, dir: &Path, name: &str) -> Result<StoredFile, StorageError> {
        let name = single_component(name)
            .ok_or_else(|| StorageError::InvalidName(name.to_string()))?;
        stat_file(&self.user_subdir(user, dir)?.join(name)).await
    }

    async fn load_file_by_path(&self, path: &Path) -> Result<StoredFile, StorageError> {
        stat_file(path).await
    }

    async fn delete_file(&self, user: &User, path: &Path) -> Result<(), StorageError> {
        if path.as_os_str().is_empty() {
            return Ok(());
        }
        if path == self.user_dir(user)? {
            return Ok(());
        }
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn delete_dir(&self, path: &Path) -> Result<(), StorageError> {
        if path.as_os_str().is_empty() {
            return Ok(());
        }
        match fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn delete_project_files(&self, user: &User, project: &Project) -> Vec<DeletionFailure> {
        let mut failures = Vec::new();

        for path in project.owned_files() {
            if let Err(error) = self.delete_file(user, &path).await {
                failures.push(DeletionFailure { path, error });
            }
        }

        if let Some(ref generated) = project.generated_project {
            if let Err(error) = self.delete_dir(&generated.path).await {
                failures.push(DeletionFailure {
                    path: generated.path.clone(),
                    error,
                });
            }
        }

        let workspace = project.workspace.root();
        let removed = match self.user_subdir(user, workspace) {
            Ok(dir) => self.delete_dir(dir).await,
            Err(e) => Err(e),
        };
        if let Err(error) = removed {
            failures.push(DeletionFailure {
                path: workspace.to_path_buf(),
                error,
            });
        }

        failures
    }

    async fn user_root_directory(&self, user: &User) -> Result<PathBuf, StorageError> {
        let dir = self.user_dir(user)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;
        Ok(dir)
    }

    fn visualization_directory(&self, project: &Project) -> Option<PathBuf> {
        project
            .generated_project
            .as_ref()
            .map(|g| g.path.join(&self.visualization_subdir))
    }
}
