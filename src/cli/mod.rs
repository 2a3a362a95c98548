//! Command-line interface for quadrat.
//!
//! Provides commands for adding and updating projects, generating and
//! executing them, downloading their artifacts and inspecting the journal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::core::{Download, ExecutionReport, Orchestrator, RunOutcome};
use crate::domain::{Project, ProjectId, User};
use crate::identity::StaticIdentity;
use crate::storage::Upload;

/// quadrat - model-to-project build pipeline
#[derive(Parser, Debug)]
#[command(name = "quadrat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// User the commands run as
    #[arg(long, global = true, env = "QUADRAT_USER")]
    pub user: Option<String>,

    /// Numeric id of that user
    #[arg(long, global = true, env = "QUADRAT_USER_ID", default_value_t = 1)]
    pub user_id: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a model file and convert it into a new project
    Add {
        /// Model file to upload
        file: PathBuf,
    },

    /// Replace a project's model file and convert it again
    Update {
        /// Project ID
        id: u64,

        /// New model file
        file: PathBuf,
    },

    /// Generate the project tree from the converted model
    Generate {
        /// Project ID
        id: u64,
    },

    /// Package the generated project and run it
    Execute {
        /// Project ID
        id: u64,
    },

    /// Render the project's visualizations
    Images {
        /// Project ID
        id: u64,
    },

    /// Delete a project and all of its files
    Delete {
        /// Project ID
        id: u64,
    },

    /// List your projects
    List,

    /// Show details of a project
    Show {
        /// Project ID
        id: u64,
    },

    /// Show the operation journal of a project
    History {
        /// Project ID
        id: u64,
    },

    /// Download an artifact of a project
    Download {
        /// Project ID
        id: u64,

        /// What to download
        #[arg(value_enum)]
        artifact: DownloadTarget,

        /// Destination path (defaults to the artifact name in the current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage a project's dataset
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum DatasetCommands {
    /// Attach a data file, replacing the current one
    Add {
        /// Project ID
        id: u64,

        /// Data file to upload
        file: PathBuf,
    },

    /// Detach and delete the data file
    Remove {
        /// Project ID
        id: u64,
    },
}

/// Downloadable artifacts
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DownloadTarget {
    /// The uploaded model file
    Original,
    /// The converted XML
    Converted,
    /// The generated model
    Model,
    /// Output of the last execution
    Output,
    /// The HTML report
    Report,
    /// The attached dataset
    Dataset,
    /// Zip of the generated project
    Project,
    /// Zip of the rendered images
    Images,
}

impl DownloadTarget {
    fn file(self) -> Option<Download> {
        match self {
            DownloadTarget::Original => Some(Download::Original),
            DownloadTarget::Converted => Some(Download::Converted),
            DownloadTarget::Model => Some(Download::Model),
            DownloadTarget::Output => Some(Download::Output),
            DownloadTarget::Report => Some(Download::Report),
            DownloadTarget::Dataset => Some(Download::Dataset),
            DownloadTarget::Project | DownloadTarget::Images => None,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Config => show_config(),
            command => {
                let orchestrator = build_orchestrator(self.user, self.user_id)?;
                run_command(&orchestrator, command).await
            }
        }
    }
}

fn build_orchestrator(user: Option<String>, user_id: u64) -> Result<Orchestrator> {
    let cfg = config::config()?;
    let identity = match user {
        Some(name) => StaticIdentity::new(User::new(user_id, name)),
        None => StaticIdentity::anonymous(),
    };
    Ok(Orchestrator::from_config(cfg, Arc::new(identity)))
}

/// Run a project command
async fn run_command(orchestrator: &Orchestrator, command: Commands) -> Result<()> {
    match command {
        Commands::Add { file } => {
            let upload = Upload::from_path(&file).await?;
            let project = orchestrator.add_project(upload).await?;
            println!("Created project {}", project.id);
            print_project(&project);
        }
        Commands::Update { id, file } => {
            let upload = Upload::from_path(&file).await?;
            let project = orchestrator.update_project(ProjectId(id), upload).await?;
            println!("Updated project {}", project.id);
            print_project(&project);
        }
        Commands::Generate { id } => {
            let project = orchestrator.generate(ProjectId(id)).await?;
            if let Some(ref generated) = project.generated_project {
                println!("Generated {}", generated.path.display());
            }
        }
        Commands::Execute { id } => {
            let report = orchestrator.execute(ProjectId(id)).await?;
            print_report(&report);
        }
        Commands::Images { id } => {
            let report = orchestrator.generate_images(ProjectId(id)).await?;
            print_report(&report);
        }
        Commands::Delete { id } => {
            orchestrator.delete_project(ProjectId(id)).await?;
            println!("Deleted project {}", id);
        }
        Commands::List => list_projects(orchestrator).await?,
        Commands::Show { id } => {
            let project = orchestrator.get_project(ProjectId(id)).await?;
            print_project(&project);
        }
        Commands::History { id } => show_history(orchestrator, ProjectId(id)).await?,
        Commands::Download { id, artifact, out } => {
            download(orchestrator, ProjectId(id), artifact, out).await?
        }
        Commands::Dataset { command } => match command {
            DatasetCommands::Add { id, file } => {
                let upload = Upload::from_path(&file).await?;
                let project = orchestrator.add_dataset(ProjectId(id), upload).await?;
                println!("Attached dataset to project {}", project.id);
            }
            DatasetCommands::Remove { id } => {
                orchestrator.remove_dataset(ProjectId(id)).await?;
                println!("Removed dataset from project {}", id);
            }
        },
        Commands::Config => show_config()?,
    }

    Ok(())
}

fn print_project(project: &Project) {
    let summary = project.summary();
    println!("Project:    {}", summary.id);
    println!("Uploaded:   {}", summary.upload_date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Original:   {}", summary.original_file_name);
    println!(
        "Converted:  {}",
        summary.converted_file_name.as_deref().unwrap_or("-")
    );
    println!("Model:      {}", summary.model_file_name.as_deref().unwrap_or("-"));
    println!(
        "Generated:  {}",
        summary.generated_project_name.as_deref().unwrap_or("-")
    );
    println!("Dataset:    {}", summary.dataset_name.as_deref().unwrap_or("-"));
    if let Some(ref output) = project.output_path {
        println!("Output:     {}", output.display());
    }
}

fn print_report(report: &ExecutionReport) {
    if let Some(output) = report.outcome.output() {
        println!("{}", output);
    }
    match report.outcome {
        RunOutcome::Completed { exit_code, .. } => eprintln!(
            "\n[Finished with exit code {}; output saved to {}]",
            exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
            report.log_path.display()
        ),
        RunOutcome::TimedOut { after, .. } => eprintln!(
            "\n[Stopped after {}s; partial output saved to {}]",
            after.as_secs(),
            report.log_path.display()
        ),
        RunOutcome::FailedToStart(ref e) => eprintln!("\n[Failed to start: {}]", e),
    }
}

/// List the current user's projects
async fn list_projects(orchestrator: &Orchestrator) -> Result<()> {
    let projects = orchestrator.list_projects().await?;

    if projects.is_empty() {
        println!("No projects found");
        return Ok(());
    }

    println!("{:<6} {:<30} {:<20} {:<10}", "ID", "ORIGINAL", "UPLOADED", "STATE");
    println!("{}", "-".repeat(70));

    for project in projects {
        let state = if project.output_path.is_some() {
            "executed"
        } else if project.is_generated() {
            "generated"
        } else {
            "converted"
        };
        println!(
            "{:<6} {:<30} {:<20} {:<10}",
            project.id,
            project.original.name,
            project.upload_date.format("%Y-%m-%d %H:%M"),
            state
        );
    }

    Ok(())
}

/// Show the journal of a project
async fn show_history(orchestrator: &Orchestrator, id: ProjectId) -> Result<()> {
    let events = orchestrator.history(id).await?;

    if events.is_empty() {
        println!("No journal entries for project {}", id);
        return Ok(());
    }

    for event in events {
        let duration = event
            .duration_ms
            .map(|ms| format!(" ({}ms)", ms))
            .unwrap_or_default();
        println!(
            "{} {:<16} {:<18} {:?}{}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.operation,
            event.stage.map(|s| s.to_string()).unwrap_or_default(),
            event.event_type,
            duration
        );
        if let Some(error) = event.error {
            println!("    error: {}", error);
        }
    }

    Ok(())
}

/// Copy a project artifact (or write an archive) to a local path
async fn download(
    orchestrator: &Orchestrator,
    id: ProjectId,
    target: DownloadTarget,
    out: Option<PathBuf>,
) -> Result<()> {
    let destination = match target.file() {
        Some(kind) => {
            let file = orchestrator.download(id, kind).await?;
            let destination = out.unwrap_or_else(|| PathBuf::from(&file.name));
            tokio::fs::copy(&file.path, &destination)
                .await
                .with_context(|| format!("Failed to copy {} to {}", file.path.display(), destination.display()))?;
            destination
        }
        None => {
            let archive = match target {
                DownloadTarget::Images => orchestrator.archive_images(id).await?,
                _ => orchestrator.archive_generated_project(id).await?,
            };
            let destination = out.unwrap_or_else(|| PathBuf::from(&archive.name));
            tokio::fs::write(&destination, &archive.bytes)
                .await
                .with_context(|| format!("Failed to write {}", destination.display()))?;
            destination
        }
    };

    println!("Saved {}", destination.display());
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;
    let settings = &cfg.settings;

    println!("Config file: {}", cfg.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(none - using defaults)".to_string()));
    println!();
    println!("Paths:");
    println!("  Home (engine state): {}", cfg.home.display());
    println!("  Storage:             {}", cfg.storage.display());
    println!("  Records:             {}", cfg.projects_path().display());
    println!("  Journal:             {}", cfg.journal_path().display());
    println!();
    println!("Tools:");
    for (name, tool) in settings.tools.iter() {
        println!("  {:<17} {} {}", name, tool.program.display(), tool.args.join(" "));
    }
    println!();
    println!("Layout:");
    println!("  Build descriptor: {}", settings.layout.build_descriptor.display());
    println!("  Execution dir:    {}", settings.layout.execution_subdir.display());
    println!("  Dataset dir:      {}", settings.layout.dataset_subdir.display());
    println!("  Images dir:       {}", settings.layout.visualization_subdir.display());
    println!("  Artifact pattern: {}", settings.layout.artifact_pattern);
    println!();
    println!("Limits:");
    println!("  Execution timeout: {}s", settings.limits.project_timeout_seconds);
    println!("  Images timeout:    {}s", settings.limits.images_timeout_seconds);
    if let Some(ref runtime) = settings.runtime_path {
        println!("  Runtime PATH:      {}", runtime.display());
    }

    Ok(())
}
