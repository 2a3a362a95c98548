//! Shared fixtures for integration tests.
//!
//! `ScriptedInvoker` stands in for every external tool: it performs the file
//! side effects the real tools would and answers with scripted output.

#![allow(dead_code)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use quadrat::core::{ExecutionLimits, Journal, Layout, PipelineSettings, ToolSet};
use quadrat::{
    InvokeError, LocalStorage, MemoryProjectStore, Orchestrator, StaticIdentity, ToolCommand,
    ToolInvoker, ToolOutput, ToolSpec, User,
};

/// Scripted answers for the fake tools
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Stdout of the generator; error lines make generation fail
    pub generator_output: Option<String>,

    /// Model converter prints nothing
    pub model_conversion_fails: bool,

    /// Result of running the built artifact (default: "result")
    pub run_output: Option<ToolOutput>,

    /// Time the generator takes
    pub generation_delay: Duration,
}

#[derive(Default)]
pub struct ScriptedInvoker {
    script: Mutex<Script>,
    calls: Mutex<Vec<ToolCommand>>,
    generations: AtomicUsize,
    active_generations: AtomicUsize,
    peak_generations: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn update_script(&self, change: impl FnOnce(&mut Script)) {
        change(&mut self.script.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == Path::new(program))
            .collect()
    }

    pub fn peak_concurrent_generations(&self) -> usize {
        self.peak_generations.load(Ordering::SeqCst)
    }
}

fn arg(command: &ToolCommand, index: usize) -> PathBuf {
    PathBuf::from(&command.args[index])
}

fn arg_after(command: &ToolCommand, flag: &str) -> PathBuf {
    let position = command
        .args
        .iter()
        .position(|a| a == &OsString::from(flag))
        .unwrap();
    arg(command, position + 1)
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, command: &ToolCommand) -> Result<ToolOutput, InvokeError> {
        self.calls.lock().unwrap().push(command.clone());
        let script = self.script.lock().unwrap().clone();

        let program = command.program.to_string_lossy().into_owned();
        match program.as_str() {
            "fmt" => {
                let original = arg(command, 0);
                let stem = original.file_stem().unwrap().to_string_lossy().into_owned();
                let converted = original.with_file_name(format!("{}_converted.xml", stem));
                std::fs::write(&converted, "<converted/>").unwrap();
                Ok(ToolOutput::success(format!(
                    "Reading {}\n{}\n",
                    original.display(),
                    converted.display()
                )))
            }
            "m2c" => {
                if script.model_conversion_fails {
                    return Ok(ToolOutput::success("").with_exit_code(1));
                }
                let converted = arg(command, 0);
                let destination = arg(command, 1);
                let stem = converted
                    .file_stem()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches("_converted")
                    .to_string();
                let model_name = format!("{}.thingml", stem);
                std::fs::write(destination.join(&model_name), "thing Model {}").unwrap();
                // Answers relative to the destination, as the real converter does
                Ok(ToolOutput::success(model_name))
            }
            "gen" => {
                let destination = arg_after(command, "-o");
                let run = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

                let active = self.active_generations.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_generations.fetch_max(active, Ordering::SeqCst);
                if !script.generation_delay.is_zero() {
                    tokio::time::sleep(script.generation_delay).await;
                }
                self.active_generations.fetch_sub(1, Ordering::SeqCst);

                let output = script
                    .generator_output
                    .unwrap_or_else(|| "Generation complete".to_string());
                if !output.contains("ERROR:") {
                    let build_dir = destination.join("python_java");
                    std::fs::create_dir_all(&build_dir).unwrap();
                    std::fs::write(build_dir.join("pom.xml"), "<project/>").unwrap();
                    std::fs::write(destination.join(format!("run-{}.txt", run)), "").unwrap();
                }
                Ok(ToolOutput::success(output))
            }
            "mvn" => {
                let descriptor = arg_after(command, "-f");
                let target = descriptor.parent().unwrap().join("target");
                std::fs::create_dir_all(&target).unwrap();
                std::fs::write(target.join("model-1.0-jar-with-dependencies.jar"), "jar").unwrap();
                Ok(ToolOutput::success("BUILD SUCCESS"))
            }
            "run" => Ok(script
                .run_output
                .unwrap_or_else(|| ToolOutput::success("result"))),
            "img" => {
                if let Some(ref dir) = command.working_dir {
                    let vis = dir.join("python_java/target/visualization");
                    std::fs::create_dir_all(&vis).unwrap();
                    std::fs::write(vis.join("plot.png"), "png").unwrap();
                    std::fs::write(vis.join("html_report.html"), "<html/>").unwrap();
                }
                Ok(ToolOutput::success("images done"))
            }
            other => Err(InvokeError::Spawn {
                command: other.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}

/// Settings naming the scripted tools
pub fn scripted_settings() -> PipelineSettings {
    PipelineSettings {
        tools: ToolSet {
            format_converter: ToolSpec::new("fmt"),
            model_converter: ToolSpec::new("m2c"),
            generator: ToolSpec::new("gen"),
            builder: ToolSpec::new("mvn"),
            runner: ToolSpec::new("run"),
            images: ToolSpec::new("img"),
        },
        layout: Layout::default(),
        limits: ExecutionLimits::default(),
        runtime_path: None,
    }
}

pub fn alice() -> User {
    User::new(1, "u1")
}

pub fn bob() -> User {
    User::new(2, "u2")
}

/// Orchestrators for several users sharing one storage, store and journal
pub struct Fixture {
    pub temp: TempDir,
    pub invoker: Arc<ScriptedInvoker>,
    pub storage: Arc<LocalStorage>,
    pub store: Arc<MemoryProjectStore>,
    pub settings: PipelineSettings,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(scripted_settings())
    }

    pub fn with_settings(settings: PipelineSettings) -> Self {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(
            temp.path().join("storage"),
            &settings.layout.visualization_subdir,
        );
        Self {
            temp,
            invoker: Arc::new(ScriptedInvoker::default()),
            storage: Arc::new(storage),
            store: Arc::new(MemoryProjectStore::new()),
            settings,
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.temp.path().join("home").join("journal.jsonl")
    }

    /// Orchestrator acting as `user` (anonymous when `None`)
    pub fn orchestrator(&self, user: Option<User>) -> Orchestrator {
        self.orchestrator_with(self.invoker.clone(), user)
    }

    pub fn orchestrator_with(&self, invoker: Arc<dyn ToolInvoker>, user: Option<User>) -> Orchestrator {
        let identity = match user {
            Some(user) => StaticIdentity::new(user),
            None => StaticIdentity::anonymous(),
        };
        Orchestrator::new(
            invoker,
            self.storage.clone(),
            self.store.clone(),
            Arc::new(identity),
            self.settings.clone(),
            Journal::new(self.journal_path()),
        )
    }

    pub fn user_dir(&self, user: &User) -> PathBuf {
        self.storage.root().join(&user.name)
    }

    /// Write a local model file to upload
    pub fn model_file(&self, name: &str) -> PathBuf {
        let uploads = self.temp.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let path = uploads.join(name);
        std::fs::write(&path, "<sirius/>").unwrap();
        path
    }
}
