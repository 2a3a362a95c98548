//! Main orchestrator for project operations.
//!
//! Each operation runs its stages strictly in order against an in-memory
//! copy of the project record and persists the record only when the
//! operation has succeeded (execute is the exception: timed-out runs still
//! persist their output path). Operations on one project are serialized.
//! Every conversion chain writes into its own workspace, so a project never
//! touches another project's files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, instrument, warn};

use crate::adapters::{ProcessInvoker, ToolInvoker};
use crate::config::ResolvedConfig;
use crate::domain::{
    ArtifactRef, Event, EventType, NewProject, Operation, Project, ProjectId, User, Workspace,
};
use crate::identity::Identity;
use crate::storage::{archive, LocalStorage, Storage, StorageError, StoredFile, Upload};
use crate::store::{JsonProjectStore, ProjectStore};

use super::error::{PipelineError, PipelineResult};
use super::guard::{ExecutionGuard, RunOutcome};
use super::journal::Journal;
use super::locks::ProjectLocks;
use super::pipeline::PipelineSettings;
use super::stages::{
    find_build_artifact, run_stage, CodeGeneration, CodeGenerationInput, Execute, ExecuteInput,
    FormatConversion, GenerateImages, ModelConversion, ModelConversionInput, Package, Stage,
};

/// Files a client can download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Download {
    Original,
    Converted,
    Model,
    Output,
    Report,
    Dataset,
}

/// An in-memory zip ready to hand to a client
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Result of a guarded run (execute or generate-images)
#[derive(Debug)]
pub struct ExecutionReport {
    pub project: Project,

    /// File holding the captured output
    pub log_path: PathBuf,
    pub outcome: RunOutcome,
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    invoker: Arc<dyn ToolInvoker>,
    storage: Arc<dyn Storage>,
    store: Arc<dyn ProjectStore>,
    identity: Arc<dyn Identity>,
    settings: PipelineSettings,
    journal: Journal,
    locks: ProjectLocks,
}

impl Orchestrator {
    /// Create an orchestrator from explicit collaborators
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        storage: Arc<dyn Storage>,
        store: Arc<dyn ProjectStore>,
        identity: Arc<dyn Identity>,
        settings: PipelineSettings,
        journal: Journal,
    ) -> Self {
        Self {
            invoker,
            storage,
            store,
            identity,
            settings,
            journal,
            locks: ProjectLocks::new(),
        }
    }

    /// Create an orchestrator backed by local disk and real processes
    pub fn from_config(config: &ResolvedConfig, identity: Arc<dyn Identity>) -> Self {
        let storage = LocalStorage::new(
            &config.storage,
            &config.settings.layout.visualization_subdir,
        );
        Self::new(
            Arc::new(ProcessInvoker::new()),
            Arc::new(storage),
            Arc::new(JsonProjectStore::new(config.projects_path())),
            identity,
            config.settings.clone(),
            Journal::new(config.journal_path()),
        )
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Projects owned by the current user, by id
    pub async fn list_projects(&self) -> PipelineResult<Vec<Project>> {
        let user = self.current_user()?;
        let mut projects = self.store.find_by_owner(user.id).await?;
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    pub async fn get_project(&self, id: ProjectId) -> PipelineResult<Project> {
        let user = self.current_user()?;
        self.owned_project(&user, id).await
    }

    /// Journal entries for a project, oldest first
    pub async fn history(&self, id: ProjectId) -> PipelineResult<Vec<Event>> {
        let user = self.current_user()?;
        self.owned_project(&user, id).await?;
        self.journal.history(id).await.map_err(|e| {
            PipelineError::io(
                "Failed to read journal",
                std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e)),
            )
        })
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Store an upload, convert it twice and create the project
    #[instrument(skip_all, fields(file = %upload.file_name))]
    pub async fn add_project(&self, upload: Upload) -> PipelineResult<Project> {
        let started = self.begin(None, Operation::Add).await;
        let result = self.add_inner(upload).await;
        let id = result.as_ref().ok().map(|p| p.id);
        self.conclude(id, Operation::Add, started, result).await
    }

    async fn add_inner(&self, upload: Upload) -> PipelineResult<Project> {
        let user = self.current_user()?;
        let _creation = self.locks.acquire_creation().await;

        if self
            .store
            .find_by_original_name(&upload.file_name)
            .await?
            .is_some()
        {
            return Err(PipelineError::AlreadyExists(upload.file_name));
        }

        let workspace = self.storage.create_workspace(&user).await?;
        let created = match self
            .convert(&user, None, Operation::Add, &workspace, &upload)
            .await
        {
            Ok((original, converted, model)) => self
                .store
                .create(NewProject {
                    owner: user.id,
                    workspace: workspace.clone(),
                    original,
                    converted,
                    model,
                })
                .await
                .map_err(PipelineError::from),
            Err(e) => Err(e),
        };

        match created {
            Ok(project) => {
                info!(project = %project.id, "Project created");
                Ok(project)
            }
            Err(e) => {
                self.discard_workspace(&workspace).await;
                Err(e)
            }
        }
    }

    /// Replace the uploaded file and redo both conversions
    ///
    /// Old files are deleted only once the new chain is saved; on failure the
    /// record and its files are left as they were.
    #[instrument(skip_all, fields(project = %id, file = %upload.file_name))]
    pub async fn update_project(&self, id: ProjectId, upload: Upload) -> PipelineResult<Project> {
        let started = self.begin(Some(id), Operation::Update).await;
        let result = self.update_inner(id, upload).await;
        self.conclude(Some(id), Operation::Update, started, result).await
    }

    async fn update_inner(&self, id: ProjectId, upload: Upload) -> PipelineResult<Project> {
        let user = self.current_user()?;
        let (_guard, mut project) = self.lock_owned(&user, id).await?;

        if let Some(other) = self.store.find_by_original_name(&upload.file_name).await? {
            if other.id != id {
                return Err(PipelineError::AlreadyExists(upload.file_name));
            }
        }

        let previous = project.clone();
        let workspace = self.storage.create_workspace(&user).await?;

        let saved = match self
            .convert(&user, Some(id), Operation::Update, &workspace, &upload)
            .await
        {
            Ok((original, converted, model)) => {
                project.replace_chain(workspace.clone(), original, converted, model);
                self.store.save(&project).await.map_err(PipelineError::from)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = saved {
            self.discard_workspace(&workspace).await;
            return Err(e);
        }

        for failure in self.storage.delete_project_files(&user, &previous).await {
            warn!(
                path = %failure.path.display(),
                "Failed to delete previous project file: {}", failure.error
            );
        }

        Ok(project)
    }

    /// Regenerate the project tree from the model
    #[instrument(skip_all, fields(project = %id))]
    pub async fn generate(&self, id: ProjectId) -> PipelineResult<Project> {
        let started = self.begin(Some(id), Operation::Generate).await;
        let result = self.generate_inner(id).await;
        self.conclude(Some(id), Operation::Generate, started, result).await
    }

    async fn generate_inner(&self, id: ProjectId) -> PipelineResult<Project> {
        let user = self.current_user()?;
        let (_guard, mut project) = self.lock_owned(&user, id).await?;

        let model = project.model.clone().ok_or(PipelineError::MissingArtifact {
            project: id,
            artifact: "generated model",
        })?;

        if let Some(ref existing) = project.generated_project {
            self.storage.delete_dir(&existing.path).await?;
        }

        let destination = project.workspace.generated_dir(&project.model_stem());
        self.storage.delete_dir(&destination).await?;
        fs::create_dir_all(&destination).await.map_err(|e| {
            PipelineError::io(format!("Failed to create {}", destination.display()), e)
        })?;

        let stage = CodeGeneration {
            tool: self.settings.tools.generator.clone(),
        };
        let input = CodeGenerationInput {
            model: model.path,
            destination,
        };
        let generated = self
            .run_journaled(Some(id), Operation::Generate, &stage, &input)
            .await?;

        project.generated_project = Some(generated);
        self.store.save(&project).await?;
        Ok(project)
    }

    /// Package the generated project and run it under the execution deadline
    #[instrument(skip_all, fields(project = %id))]
    pub async fn execute(&self, id: ProjectId) -> PipelineResult<ExecutionReport> {
        let started = self.begin(Some(id), Operation::Execute).await;
        let result = self.execute_inner(id).await;
        self.conclude(Some(id), Operation::Execute, started, result).await
    }

    async fn execute_inner(&self, id: ProjectId) -> PipelineResult<ExecutionReport> {
        let user = self.current_user()?;
        let (_guard, mut project) = self.lock_owned(&user, id).await?;

        let project_dir = project
            .generated_project
            .as_ref()
            .map(|g| g.path.clone())
            .ok_or(PipelineError::NotGenerated(id))?;
        let layout = &self.settings.layout;

        let package = Package {
            tool: self.settings.tools.builder.clone(),
            build_descriptor: layout.build_descriptor.clone(),
        };
        self.run_journaled(Some(id), Operation::Execute, &package, &project_dir)
            .await?;

        if let Some(ref dataset) = project.dataset {
            copy_dataset(&dataset.path, &project_dir.join(&layout.dataset_subdir)).await?;
        }

        let working_dir = project_dir.join(&layout.execution_subdir);
        let artifact = find_build_artifact(&working_dir, &layout.artifact_pattern)?;

        let stage = Execute {
            tool: self.settings.tools.runner.clone(),
            deadline: self.settings.limits.project_timeout(),
            runtime_path: self.settings.runtime_path.clone(),
        };
        let log_path = project.workspace.output_file(&project.model_stem(), "output");

        let outcome = self
            .run_guarded(
                Some(id),
                Operation::Execute,
                &stage,
                &ExecuteInput {
                    artifact,
                    working_dir,
                },
                &log_path,
            )
            .await?;

        project.output_path = Some(log_path.clone());
        self.store.save(&project).await?;

        Ok(ExecutionReport {
            project,
            log_path,
            outcome,
        })
    }

    /// Render visualizations under the images deadline; the record is not changed
    #[instrument(skip_all, fields(project = %id))]
    pub async fn generate_images(&self, id: ProjectId) -> PipelineResult<ExecutionReport> {
        let started = self.begin(Some(id), Operation::GenerateImages).await;
        let result = self.generate_images_inner(id).await;
        self.conclude(Some(id), Operation::GenerateImages, started, result)
            .await
    }

    async fn generate_images_inner(&self, id: ProjectId) -> PipelineResult<ExecutionReport> {
        let user = self.current_user()?;
        let (_guard, project) = self.lock_owned(&user, id).await?;

        let stage = GenerateImages {
            tool: self.settings.tools.images.clone(),
            deadline: self.settings.limits.images_timeout(),
        };
        let working_dir = project.generated_project.as_ref().map(|g| g.path.clone());
        let log_path = project
            .workspace
            .output_file(&project.model_stem(), "images-output");

        let outcome = self
            .run_guarded(
                Some(id),
                Operation::GenerateImages,
                &stage,
                &working_dir,
                &log_path,
            )
            .await?;

        Ok(ExecutionReport {
            project,
            log_path,
            outcome,
        })
    }

    /// Delete every owned file, then the record
    #[instrument(skip_all, fields(project = %id))]
    pub async fn delete_project(&self, id: ProjectId) -> PipelineResult<()> {
        let started = self.begin(Some(id), Operation::Delete).await;
        let result = self.delete_inner(id).await;
        self.conclude(Some(id), Operation::Delete, started, result).await
    }

    async fn delete_inner(&self, id: ProjectId) -> PipelineResult<()> {
        let user = self.current_user()?;
        let (guard, project) = self.lock_owned(&user, id).await?;

        for failure in self.storage.delete_project_files(&user, &project).await {
            warn!(
                path = %failure.path.display(),
                "Failed to delete project file: {}", failure.error
            );
        }

        self.store.delete(id).await?;
        drop(guard);
        self.locks.remove(id);
        info!("Project deleted");
        Ok(())
    }

    // ========================================================================
    // Datasets
    // ========================================================================

    /// Attach a data file, replacing any previous one
    #[instrument(skip_all, fields(project = %id, file = %upload.file_name))]
    pub async fn add_dataset(&self, id: ProjectId, upload: Upload) -> PipelineResult<Project> {
        let user = self.current_user()?;
        let (_guard, mut project) = self.lock_owned(&user, id).await?;

        let path = self
            .storage
            .store_file(&user, &project.workspace.dataset_dir(), &upload)
            .await?;
        if let Some(previous) = project.dataset.take() {
            if previous.path != path {
                self.storage.delete_file(&user, &previous.path).await?;
            }
        }

        project.dataset = Some(ArtifactRef::new(upload.file_name, path));
        self.store.save(&project).await?;
        info!("Dataset attached");
        Ok(project)
    }

    #[instrument(skip_all, fields(project = %id))]
    pub async fn remove_dataset(&self, id: ProjectId) -> PipelineResult<Project> {
        let user = self.current_user()?;
        let (_guard, mut project) = self.lock_owned(&user, id).await?;

        if let Some(dataset) = project.dataset.take() {
            self.storage.delete_file(&user, &dataset.path).await?;
            self.store.save(&project).await?;
            info!("Dataset removed");
        }
        Ok(project)
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Resolve a downloadable file of the project
    pub async fn download(&self, id: ProjectId, what: Download) -> PipelineResult<StoredFile> {
        let user = self.current_user()?;
        let project = self.owned_project(&user, id).await?;

        let missing = |artifact: &'static str| PipelineError::MissingArtifact {
            project: id,
            artifact,
        };

        let file = match what {
            Download::Original => {
                self.storage
                    .load_file_by_name(&user, &project.workspace.source_dir(), &project.original.name)
                    .await?
            }
            Download::Converted => {
                let converted = project.converted.as_ref().ok_or_else(|| missing("converted file"))?;
                self.storage.load_file_by_path(&converted.path).await?
            }
            Download::Model => {
                let model = project.model.as_ref().ok_or_else(|| missing("generated model"))?;
                self.storage.load_file_by_path(&model.path).await?
            }
            Download::Output => {
                let output = project.output_path.as_ref().ok_or_else(|| missing("generated output"))?;
                self.storage.load_file_by_path(output).await?
            }
            Download::Report => {
                let report = self
                    .storage
                    .visualization_directory(&project)
                    .ok_or(PipelineError::NotGenerated(id))?
                    .join(&self.settings.layout.report_name);
                match self.storage.load_file_by_path(&report).await {
                    Ok(file) => file,
                    Err(StorageError::NotFound(_)) => return Err(missing("report")),
                    Err(e) => return Err(e.into()),
                }
            }
            Download::Dataset => {
                let dataset = project.dataset.as_ref().ok_or_else(|| missing("dataset"))?;
                self.storage.load_file_by_path(&dataset.path).await?
            }
        };
        Ok(file)
    }

    /// Zip of the generated project tree
    pub async fn archive_generated_project(&self, id: ProjectId) -> PipelineResult<Archive> {
        let user = self.current_user()?;
        let project = self.owned_project(&user, id).await?;
        let generated = project
            .generated_project
            .ok_or(PipelineError::NotGenerated(id))?;

        let bytes = zip_blocking(generated.path, archive::zip_tree).await?;
        Ok(Archive {
            name: format!("{}.zip", generated.name),
            bytes,
        })
    }

    /// Zip of the rendered visualizations
    pub async fn archive_images(&self, id: ProjectId) -> PipelineResult<Archive> {
        let user = self.current_user()?;
        let project = self.owned_project(&user, id).await?;
        let dir = self
            .storage
            .visualization_directory(&project)
            .ok_or(PipelineError::NotGenerated(id))?;

        if !dir.is_dir() {
            return Err(PipelineError::MissingArtifact {
                project: id,
                artifact: "images",
            });
        }

        let bytes = zip_blocking(dir, archive::zip_flat).await?;
        Ok(Archive {
            name: format!("{}-images.zip", project.model_stem()),
            bytes,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn current_user(&self) -> PipelineResult<User> {
        self.identity
            .current_user()
            .ok_or(PipelineError::Unauthenticated)
    }

    async fn owned_project(&self, user: &User, id: ProjectId) -> PipelineResult<Project> {
        let project = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(PipelineError::NotFound(id))?;
        if project.owner != user.id {
            return Err(PipelineError::NotOwner {
                user: user.id,
                project: id,
            });
        }
        Ok(project)
    }

    /// Lock `id` for the rest of the operation and load it
    ///
    /// Unknown and foreign ids are rejected before a lock entry is created.
    async fn lock_owned(
        &self,
        user: &User,
        id: ProjectId,
    ) -> PipelineResult<(OwnedMutexGuard<()>, Project)> {
        self.owned_project(user, id).await?;
        let guard = self.locks.acquire(id).await;

        // Deleted while we waited
        match self.owned_project(user, id).await {
            Ok(project) => Ok((guard, project)),
            Err(e) => {
                drop(guard);
                if matches!(e, PipelineError::NotFound(_)) {
                    self.locks.remove(id);
                }
                Err(e)
            }
        }
    }

    /// Store the upload in the workspace and run stages 1 and 2 on it
    async fn convert(
        &self,
        user: &User,
        project_id: Option<ProjectId>,
        operation: Operation,
        workspace: &Workspace,
        upload: &Upload,
    ) -> PipelineResult<(ArtifactRef, ArtifactRef, ArtifactRef)> {
        let source = workspace.source_dir();
        let original_path = self.storage.store_file(user, &source, upload).await?;
        let original = ArtifactRef::new(upload.file_name.clone(), original_path);

        let format = FormatConversion {
            tool: self.settings.tools.format_converter.clone(),
        };
        let converted = self
            .run_journaled(project_id, operation, &format, &original.path)
            .await?;

        let model_stage = ModelConversion {
            tool: self.settings.tools.model_converter.clone(),
        };
        let input = ModelConversionInput {
            converted: converted.path.clone(),
            destination: source,
        };
        let model = self
            .run_journaled(project_id, operation, &model_stage, &input)
            .await?;

        Ok((original, converted, model))
    }

    /// Remove an unused workspace best-effort
    async fn discard_workspace(&self, workspace: &Workspace) {
        if let Err(e) = self.storage.delete_dir(workspace.root()).await {
            warn!(path = %workspace.root().display(), "Failed to remove workspace: {}", e);
        }
    }

    /// Run one stage and journal its start and end
    async fn run_journaled<S: Stage>(
        &self,
        project_id: Option<ProjectId>,
        operation: Operation,
        stage: &S,
        input: &S::Input,
    ) -> PipelineResult<S::Output> {
        let name = stage.name();
        info!(stage = %name, "Stage started");
        self.journal
            .record(Event::new(
                project_id,
                operation,
                Some(name),
                EventType::StageStarted,
                format!("Stage '{}' started", name),
            ))
            .await;

        let started = Instant::now();
        let result = run_stage(self.invoker.as_ref(), stage, input).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let event = match &result {
            Ok(_) => {
                info!(stage = %name, duration_ms, "Stage completed");
                Event::new(
                    project_id,
                    operation,
                    Some(name),
                    EventType::StageCompleted,
                    format!("Stage '{}' completed in {}ms", name, duration_ms),
                )
                .with_duration(duration_ms)
            }
            Err(e) => {
                error!(stage = %name, error = %e, "Stage failed");
                Event::new(
                    project_id,
                    operation,
                    Some(name),
                    EventType::StageFailed,
                    format!("Stage '{}' failed", name),
                )
                .with_duration(duration_ms)
                .with_error(e.to_string())
            }
        };
        self.journal.record(event).await;

        result
    }

    /// Run a deadline-bound stage through the guard and journal the outcome
    ///
    /// A process that never started fails the operation.
    async fn run_guarded<S>(
        &self,
        project_id: Option<ProjectId>,
        operation: Operation,
        stage: &S,
        input: &S::Input,
        log_path: &Path,
    ) -> PipelineResult<RunOutcome>
    where
        S: Stage<Output = crate::adapters::ToolOutput>,
    {
        let name = stage.name();
        self.journal
            .record(Event::new(
                project_id,
                operation,
                Some(name),
                EventType::StageStarted,
                format!("Stage '{}' started", name),
            ))
            .await;

        let started = Instant::now();
        let result = ExecutionGuard::new(self.invoker.as_ref())
            .run(stage, input, log_path)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (event_type, summary, failure) = match &result {
            Ok(RunOutcome::Completed { exit_code, .. }) => (
                EventType::StageCompleted,
                format!("Stage '{}' finished with exit code {:?}", name, exit_code),
                None,
            ),
            Ok(RunOutcome::TimedOut { after, .. }) => (
                EventType::StageTimedOut,
                format!("Stage '{}' stopped after {:?}; partial output kept", name, after),
                None,
            ),
            Ok(RunOutcome::FailedToStart(e)) => (
                EventType::StageFailed,
                format!("Stage '{}' failed to start", name),
                Some(e.to_string()),
            ),
            Err(e) => (
                EventType::StageFailed,
                format!("Stage '{}' failed", name),
                Some(e.to_string()),
            ),
        };

        let mut event = Event::new(project_id, operation, Some(name), event_type, summary)
            .with_duration(duration_ms);
        if let Some(error) = failure {
            error!(stage = %name, error = %error, "Guarded stage failed");
            event = event.with_error(error);
        }
        self.journal.record(event).await;

        match result? {
            RunOutcome::FailedToStart(e) => Err(PipelineError::Tool(e)),
            outcome => Ok(outcome),
        }
    }

    async fn begin(&self, project_id: Option<ProjectId>, operation: Operation) -> Instant {
        info!(%operation, "Operation started");
        self.journal
            .record(Event::new(
                project_id,
                operation,
                None,
                EventType::OperationStarted,
                format!("Operation '{}' started", operation),
            ))
            .await;
        Instant::now()
    }

    async fn conclude<T>(
        &self,
        project_id: Option<ProjectId>,
        operation: Operation,
        started: Instant,
        result: PipelineResult<T>,
    ) -> PipelineResult<T> {
        let duration_ms = started.elapsed().as_millis() as u64;
        let event = match &result {
            Ok(_) => {
                info!(%operation, duration_ms, "Operation completed");
                Event::new(
                    project_id,
                    operation,
                    None,
                    EventType::OperationCompleted,
                    format!("Operation '{}' completed in {}ms", operation, duration_ms),
                )
                .with_duration(duration_ms)
            }
            Err(e) => {
                error!(%operation, error = %e, "Operation failed");
                Event::new(
                    project_id,
                    operation,
                    None,
                    EventType::OperationFailed,
                    format!("Operation '{}' failed", operation),
                )
                .with_duration(duration_ms)
                .with_error(e.to_string())
            }
        };
        self.journal.record(event).await;
        result
    }
}

/// Copy the dataset into the build's data directory
async fn copy_dataset(source: &Path, data_dir: &Path) -> PipelineResult<()> {
    fs::create_dir_all(data_dir)
        .await
        .map_err(|e| PipelineError::io(format!("Failed to create {}", data_dir.display()), e))?;

    let file_name = source.file_name().ok_or_else(|| {
        PipelineError::io(
            format!("Dataset path {} has no file name", source.display()),
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    let target = data_dir.join(file_name);
    fs::copy(source, &target).await.map_err(|e| {
        PipelineError::io(
            format!("Failed to copy dataset to {}", target.display()),
            e,
        )
    })?;
    Ok(())
}

async fn zip_blocking(
    path: PathBuf,
    zip: fn(&Path) -> std::io::Result<Vec<u8>>,
) -> PipelineResult<Vec<u8>> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || zip(&target))
        .await
        .map_err(|e| PipelineError::Archive {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?
        .map_err(|source| PipelineError::Archive { path, source })
}
