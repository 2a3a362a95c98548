//! Errors surfaced by pipeline operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::adapters::InvokeError;
use crate::domain::{ProjectId, StageName, UserId};
use crate::storage::StorageError;
use crate::store::StoreError;

/// Typed failure of an operation; every variant aborts the operation
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The tool could not be started or its output could not be read
    #[error(transparent)]
    Tool(#[from] InvokeError),

    #[error("Conversion failed in {stage}: {reason}")]
    Conversion { stage: StageName, reason: String },

    /// Carries the tool-reported error lines
    #[error("There are errors when generating the project:\n{details}")]
    Generation { details: String },

    #[error("No build artifact matching '{pattern}' found in {}", .dir.display())]
    ArtifactNotFound { dir: PathBuf, pattern: String },

    #[error("Cannot use project {0}: the project has not been generated yet")]
    NotGenerated(ProjectId),

    #[error("User {user} is not the owner of project {project}")]
    NotOwner { user: UserId, project: ProjectId },

    #[error("No project found with id {0}")]
    NotFound(ProjectId),

    #[error("Project '{0}' already exists")]
    AlreadyExists(String),

    #[error("No authenticated user")]
    Unauthenticated,

    /// A download asked for something the pipeline never produced
    #[error("Project {project} has no {artifact} yet")]
    MissingArtifact {
        project: ProjectId,
        artifact: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
