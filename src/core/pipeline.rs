//! Pipeline settings: which tools run, where the generated project keeps
//! things, and how long guarded stages may run.
//!
//! Settings are plain serde structs with defaults so a config file only has
//! to name what differs from a standard installation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::ToolSpec;

/// Everything the stages need besides their inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default)]
    pub tools: ToolSet,

    #[serde(default)]
    pub layout: Layout,

    #[serde(default)]
    pub limits: ExecutionLimits,

    /// Prepended to `PATH` when running the built artifact (e.g. a conda bin dir)
    #[serde(default)]
    pub runtime_path: Option<PathBuf>,
}

impl PipelineSettings {
    /// Parse settings from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline settings YAML")
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.limits.project_timeout_seconds == 0 {
            anyhow::bail!("project_timeout_seconds must be greater than zero");
        }
        if self.limits.images_timeout_seconds == 0 {
            anyhow::bail!("images_timeout_seconds must be greater than zero");
        }

        glob::Pattern::new(&self.layout.artifact_pattern).with_context(|| {
            format!(
                "Invalid build artifact pattern '{}'",
                self.layout.artifact_pattern
            )
        })?;

        for (name, tool) in self.tools.iter() {
            if tool.program.as_os_str().is_empty() {
                anyhow::bail!("Tool '{}' has an empty program", name);
            }
        }

        Ok(())
    }
}

/// The external programs, one per stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSet {
    /// Sirius Web export -> EMF XML
    pub format_converter: ToolSpec,

    /// EMF XML -> `.thingml` model
    pub model_converter: ToolSpec,

    /// `.thingml` model -> project tree
    pub generator: ToolSpec,

    /// Packages the generated project
    pub builder: ToolSpec,

    /// Launches the built artifact (artifact path is appended)
    pub runner: ToolSpec,

    /// Renders visualizations
    pub images: ToolSpec,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::standard(
            Path::new("scripts"),
            Path::new("java"),
            Path::new("python3"),
            Path::new("mvn"),
        )
    }
}

impl ToolSet {
    /// The stock jars and scripts found in `scripts_dir`
    pub fn standard(scripts_dir: &Path, java: &Path, python: &Path, maven: &Path) -> Self {
        let jar = |name: &str| {
            ToolSpec::new(java).with_args([
                "-jar".to_string(),
                scripts_dir.join(name).to_string_lossy().into_owned(),
            ])
        };

        Self {
            format_converter: jar("sirius_web_to_desktop.jar"),
            model_converter: jar("m2c.jar"),
            generator: jar("mlquadrat.jar"),
            builder: ToolSpec::new(maven),
            runner: ToolSpec::new(java).with_args(["-jar"]),
            images: ToolSpec::new(python)
                .with_args([scripts_dir.join("loop.py").to_string_lossy().into_owned()]),
        }
    }

    /// All tools with their setting names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ToolSpec)> {
        [
            ("format_converter", &self.format_converter),
            ("model_converter", &self.model_converter),
            ("generator", &self.generator),
            ("builder", &self.builder),
            ("runner", &self.runner),
            ("images", &self.images),
        ]
        .into_iter()
    }
}

/// Where things live inside a generated project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// Build file handed to the builder, relative to the project root
    pub build_descriptor: PathBuf,

    /// Directory holding the packaged artifact, relative to the project root
    pub execution_subdir: PathBuf,

    /// Where an attached dataset is copied before execution
    pub dataset_subdir: PathBuf,

    /// Where the generated code writes plots and the report
    pub visualization_subdir: PathBuf,

    /// Glob selecting the runnable artifact inside `execution_subdir`
    pub artifact_pattern: String,

    /// Report file inside the visualization directory
    pub report_name: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            build_descriptor: PathBuf::from("python_java/pom.xml"),
            execution_subdir: PathBuf::from("python_java/target"),
            dataset_subdir: PathBuf::from("python_java/target/data"),
            visualization_subdir: PathBuf::from("python_java/target/visualization"),
            artifact_pattern: "*with-dependencies*.jar".to_string(),
            report_name: "html_report.html".to_string(),
        }
    }
}

/// Deadlines for the guarded stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Run time allowed for the built artifact (default: 300 = 5 min)
    #[serde(default = "default_project_timeout")]
    pub project_timeout_seconds: u64,

    /// Run time allowed for image generation (default: 120 = 2 min)
    #[serde(default = "default_images_timeout")]
    pub images_timeout_seconds: u64,
}

fn default_project_timeout() -> u64 {
    300
}
fn default_images_timeout() -> u64 {
    120
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            project_timeout_seconds: default_project_timeout(),
            images_timeout_seconds: default_images_timeout(),
        }
    }
}

impl ExecutionLimits {
    pub fn project_timeout(&self) -> Duration {
        Duration::from_secs(self.project_timeout_seconds)
    }

    pub fn images_timeout(&self) -> Duration {
        Duration::from_secs(self.images_timeout_seconds)
    }
}
