//! In-process record store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ProjectStore, StoreError};
use crate::domain::{NewProject, Project, ProjectId, UserId};

#[derive(Debug, Default)]
struct Records {
    next_id: u64,
    projects: BTreeMap<ProjectId, Project>,
}

/// Record store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    inner: RwLock<Records>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.inner.read().await.projects.get(&id).cloned())
    }

    async fn find_by_original_name(&self, name: &str) -> Result<Option<Project>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .projects
            .values()
            .find(|p| p.original.name == name)
            .cloned())
    }

    async fn find_by_owner(&self, owner: UserId) -> Result<Vec<Project>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .projects
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect())
    }

    async fn create(&self, project: NewProject) -> Result<Project, StoreError> {
        let mut records = self.inner.write().await;
        records.next_id += 1;
        let project = project.into_project(ProjectId(records.next_id));
        records.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn save(&self, project: &Project) -> Result<(), StoreError> {
        let mut records = self.inner.write().await;
        match records.projects.get_mut(&project.id) {
            Some(existing) => {
                *existing = project.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(project.id)),
        }
    }

    async fn delete(&self, id: ProjectId) -> Result<(), StoreError> {
        self.inner.write().await.projects.remove(&id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.projects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactRef, Workspace};

    fn new_project(owner: u64, name: &str) -> NewProject {
        NewProject {
            owner: UserId(owner),
            workspace: Workspace::new(format!("/s/{name}.d")),
            original: ArtifactRef::new(name, format!("/s/{name}")),
            converted: ArtifactRef::new("c.xml", "/s/c.xml"),
            model: ArtifactRef::new("m.thingml", "/s/m.thingml"),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let store = MemoryProjectStore::new();

        let first = store.create(new_project(1, "a.xml")).await.unwrap();
        let second = store.create(new_project(1, "b.xml")).await.unwrap();

        assert_eq!(first.id, ProjectId(1));
        assert_eq!(second.id, ProjectId(2));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_queries() {
        let store = MemoryProjectStore::new();
        store.create(new_project(1, "a.xml")).await.unwrap();
        store.create(new_project(2, "b.xml")).await.unwrap();

        let found = store.find_by_original_name("b.xml").await.unwrap().unwrap();
        assert_eq!(found.owner, UserId(2));
        assert!(store.find_by_original_name("c.xml").await.unwrap().is_none());
        assert_eq!(store.find_by_owner(UserId(1)).await.unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = MemoryProjectStore::new();
        tokio_test::block_on(async {
            store.create(new_project(1, "a.xml")).await.unwrap();
            store.delete(ProjectId(42)).await.unwrap();
            assert_eq!(store.count().await.unwrap(), 1);
        });
    }

    #[tokio::test]
    async fn test_save_requires_existing_record() {
        let store = MemoryProjectStore::new();
        let mut project = store.create(new_project(1, "a.xml")).await.unwrap();

        project.output_path = Some("/s/out.txt".into());
        store.save(&project).await.unwrap();
        assert_eq!(store.find_by_id(project.id).await.unwrap(), Some(project.clone()));

        store.delete(project.id).await.unwrap();
        assert!(matches!(
            store.save(&project).await,
            Err(StoreError::Missing(_))
        ));
    }
}
