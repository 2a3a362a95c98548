//! Domain types for the build pipeline.
//!
//! This module contains the core data structures:
//! - Project: the persisted record and its artifact chain
//! - Artifact: references to stage outputs
//! - Events: journal entries for operations and stages
//! - User: project owners
//! - Workspace: where a project's files live

pub mod artifact;
pub mod events;
pub mod project;
pub mod user;
pub mod workspace;

// Re-export commonly used types
pub use artifact::ArtifactRef;
pub use events::{Event, EventType, Operation, StageName};
pub use project::{NewProject, Project, ProjectId, ProjectSummary};
pub use user::{User, UserId};
pub use workspace::Workspace;
