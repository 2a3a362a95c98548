//! Configuration for quadrat paths, tools and limits.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (QUADRAT_HOME, QUADRAT_STORAGE, QUADRAT_RUNTIME_PATH)
//! 2. Config file (.quadrat/config.yaml)
//! 3. Defaults (~/.quadrat)
//!
//! Config file discovery:
//! - Searches current directory and parents for .quadrat/config.yaml
//! - `paths.home` is relative to the .quadrat/ directory, other paths to the
//!   directory containing it

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::ToolSpec;
use crate::core::{ExecutionLimits, Layout, PipelineSettings, ToolSet};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub limits: Option<ExecutionLimits>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to .quadrat/)
    pub home: Option<String>,
    /// Storage root for uploads and generated projects
    pub storage: Option<String>,
    /// Directory holding the converter jars and image script
    pub scripts: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    pub java: Option<String>,
    pub python: Option<String>,
    pub maven: Option<String>,
    /// Replacements for single tools, keyed by tool name
    #[serde(default)]
    pub overrides: BTreeMap<String, ToolSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Prepended to PATH when running the built project
    pub path: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to quadrat home (records and journal)
    pub home: PathBuf,
    /// Absolute path to the storage root
    pub storage: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Tools, layout and limits
    pub settings: PipelineSettings,
}

impl ResolvedConfig {
    /// Project records ($QUADRAT_HOME/projects.json)
    pub fn projects_path(&self) -> PathBuf {
        self.home.join("projects.json")
    }

    /// Operation journal ($QUADRAT_HOME/journal.jsonl)
    pub fn journal_path(&self) -> PathBuf {
        self.home.join("journal.jsonl")
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".quadrat").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Build the tool set, applying per-tool overrides
fn resolve_tools(scripts: &Path, tools: &ToolsConfig) -> Result<ToolSet> {
    let mut set = ToolSet::standard(
        scripts,
        Path::new(tools.java.as_deref().unwrap_or("java")),
        Path::new(tools.python.as_deref().unwrap_or("python3")),
        Path::new(tools.maven.as_deref().unwrap_or("mvn")),
    );

    for (name, spec) in &tools.overrides {
        let slot = match name.as_str() {
            "format_converter" => &mut set.format_converter,
            "model_converter" => &mut set.model_converter,
            "generator" => &mut set.generator,
            "builder" => &mut set.builder,
            "runner" => &mut set.runner,
            "images" => &mut set.images,
            other => anyhow::bail!("Unknown tool in overrides: '{}'", other),
        };
        *slot = spec.clone();
    }

    Ok(set)
}

/// Resolve configuration from an optional config file and an environment lookup
fn resolve(
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = || -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".quadrat"))
    };

    let parsed = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // .quadrat/ and the project root containing it
    let quadrat_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = quadrat_dir.parent().unwrap_or(Path::new("."));

    let paths = parsed.as_ref().map(|c| c.paths.clone()).unwrap_or_default();

    let home = match (env("QUADRAT_HOME"), paths.home) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(quadrat_dir, &home),
        (None, None) => default_home()?,
    };

    let storage = match (env("QUADRAT_STORAGE"), paths.storage) {
        (Some(env_storage), _) => PathBuf::from(env_storage),
        (None, Some(storage)) => resolve_path(base_dir, &storage),
        (None, None) => home.join("storage"),
    };

    let scripts = paths
        .scripts
        .map(|s| resolve_path(base_dir, &s))
        .unwrap_or_else(|| home.join("scripts"));

    let tools_config = parsed.as_ref().map(|c| c.tools.clone()).unwrap_or_default();
    let runtime_path = env("QUADRAT_RUNTIME_PATH")
        .or_else(|| parsed.as_ref().and_then(|c| c.runtime.path.clone()))
        .map(PathBuf::from);

    let settings = PipelineSettings {
        tools: resolve_tools(&scripts, &tools_config)?,
        layout: parsed
            .as_ref()
            .and_then(|c| c.layout.clone())
            .unwrap_or_default(),
        limits: parsed
            .as_ref()
            .and_then(|c| c.limits.clone())
            .unwrap_or_default(),
        runtime_path,
    };
    settings.validate()?;

    Ok(ResolvedConfig {
        home,
        storage,
        config_file,
        settings,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    resolve(find_config_file(&cwd), |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
