//! Project record store.
//!
//! A keyed store with single-record atomic saves and nothing more; the
//! orchestrator supplies its own serialization on top.

pub mod json;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewProject, Project, ProjectId, UserId};

pub use json::JsonProjectStore;
pub use memory::MemoryProjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Project {0} does not exist")]
    Missing(ProjectId),
}

/// Persistence for project records
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    /// Any project (of any owner) whose original upload has this name
    async fn find_by_original_name(&self, name: &str) -> Result<Option<Project>, StoreError>;

    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<Project>, StoreError>;

    /// Insert a new record and assign its id
    async fn create(&self, project: NewProject) -> Result<Project, StoreError>;

    /// Overwrite an existing record
    async fn save(&self, project: &Project) -> Result<(), StoreError>;

    async fn delete(&self, id: ProjectId) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
