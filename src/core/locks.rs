//! Per-project serialization.
//!
//! Every operation on an existing project holds that project's lock for its
//! whole duration, so concurrent `generate`/`execute`/`delete` calls on one
//! project queue up instead of racing on the record and its directories.
//! Creation is serialized separately so the duplicate-name check and the
//! insert cannot interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::ProjectId;

#[derive(Default)]
pub struct ProjectLocks {
    projects: Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
    creation: Arc<AsyncMutex<()>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `id`
    pub async fn acquire(&self, id: ProjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut projects = self
                .projects
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            projects.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Wait for exclusive use of project creation
    pub async fn acquire_creation(&self) -> OwnedMutexGuard<()> {
        self.creation.clone().lock_owned().await
    }

    /// Forget a deleted project's lock
    pub fn remove(&self, id: ProjectId) {
        let mut projects = self
            .projects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        projects.remove(&id);
    }

    /// Number of projects with a lock entry
    pub fn len(&self) -> usize {
        self.projects
            .lock()
            .map(|p| p.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
