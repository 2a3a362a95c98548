//! The project record and its artifact chain.
//!
//! A project walks through original -> converted -> generated model ->
//! generated project -> generated output. Each artifact exists only if the
//! one before it does; the orchestrator is the only writer.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactRef;
use super::user::UserId;
use super::workspace::Workspace;

/// Numeric project identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// Owning user
    pub owner: UserId,

    /// When the original file was uploaded
    pub upload_date: DateTime<Utc>,

    /// Directory holding every file of the current chain
    pub workspace: Workspace,

    /// The uploaded model file
    pub original: ArtifactRef,

    /// Output of the format conversion stage
    #[serde(default)]
    pub converted: Option<ArtifactRef>,

    /// Output of the model conversion stage (the `.thingml` file)
    #[serde(default)]
    pub model: Option<ArtifactRef>,

    /// Directory tree written by code generation
    #[serde(default)]
    pub generated_project: Option<ArtifactRef>,

    /// Captured output of the last execution
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// User-supplied data file copied into the build before execution
    #[serde(default)]
    pub dataset: Option<ArtifactRef>,
}

impl Project {
    /// Whether `generate` has succeeded for the current model
    pub fn is_generated(&self) -> bool {
        self.generated_project.is_some()
    }

    /// Base name used for files derived from the generated model
    pub fn model_stem(&self) -> String {
        self.model
            .as_ref()
            .map(ArtifactRef::stem)
            .unwrap_or_else(|| self.original.stem())
    }

    /// Every single file this project owns (directories excluded)
    pub fn owned_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.original.path.clone()];
        files.extend(self.converted.iter().map(|a| a.path.clone()));
        files.extend(self.model.iter().map(|a| a.path.clone()));
        files.extend(self.output_path.iter().cloned());
        files.extend(self.dataset.iter().map(|a| a.path.clone()));
        files
    }

    /// Replace the conversion chain, dropping everything derived from the old one
    pub fn replace_chain(
        &mut self,
        workspace: Workspace,
        original: ArtifactRef,
        converted: ArtifactRef,
        model: ArtifactRef,
    ) {
        self.workspace = workspace;
        self.original = original;
        self.converted = Some(converted);
        self.model = Some(model);
        self.generated_project = None;
        self.output_path = None;
        self.dataset = None;
        self.upload_date = Utc::now();
    }

    /// Client-facing view without storage paths
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id,
            upload_date: self.upload_date,
            original_file_name: self.original.name.clone(),
            converted_file_name: self.converted.as_ref().map(|a| a.name.clone()),
            model_file_name: self.model.as_ref().map(|a| a.name.clone()),
            generated_project_name: self.generated_project.as_ref().map(|a| a.name.clone()),
            dataset_name: self.dataset.as_ref().map(|a| a.name.clone()),
        }
    }
}

/// A project that has not been assigned an id yet
#[derive(Debug, Clone)]
pub struct NewProject {
    pub owner: UserId,
    pub workspace: Workspace,
    pub original: ArtifactRef,
    pub converted: ArtifactRef,
    pub model: ArtifactRef,
}

impl NewProject {
    /// Attach the id handed out by the record store
    pub fn into_project(self, id: ProjectId) -> Project {
        Project {
            id,
            owner: self.owner,
            upload_date: Utc::now(),
            workspace: self.workspace,
            original: self.original,
            converted: Some(self.converted),
            model: Some(self.model),
            generated_project: None,
            output_path: None,
            dataset: None,
        }
    }
}

/// Project listing entry (names only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub upload_date: DateTime<Utc>,
    pub original_file_name: String,
    pub converted_file_name: Option<String>,
    pub model_file_name: Option<String>,
    pub generated_project_name: Option<String>,
    pub dataset_name: Option<String>,
}
