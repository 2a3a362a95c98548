//! Stage catalog.
//!
//! A stage is a pure description of one tool invocation: which tool, how its
//! arguments are built from the current artifacts, and how its output is read
//! back into the next artifact. Stages never touch the project record.
//!
//! Tool output is a fragile text protocol. Each reading rule lives in exactly
//! one function here (`result_path`, `generation_errors`) so it can change
//! without touching orchestration.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::{PipelineError, PipelineResult};
use crate::adapters::{InvokeError, ToolCommand, ToolInvoker, ToolOutput, ToolSpec};
use crate::domain::{ArtifactRef, StageName};

/// One step of the pipeline
pub trait Stage: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    fn name(&self) -> StageName;

    /// Build the invocation for `input`
    fn command(&self, input: &Self::Input) -> ToolCommand;

    /// Turn captured output into this stage's result
    fn interpret(&self, input: &Self::Input, output: ToolOutput) -> PipelineResult<Self::Output>;

    /// Map a failure to start or read the tool
    fn invoke_failed(&self, error: InvokeError) -> PipelineError {
        PipelineError::Tool(error)
    }
}

/// Invoke a stage's tool and interpret the result
pub async fn run_stage<S: Stage>(
    invoker: &dyn ToolInvoker,
    stage: &S,
    input: &S::Input,
) -> PipelineResult<S::Output> {
    let command = stage.command(input);
    debug!(stage = %stage.name(), command = %command, "Invoking tool");

    let output = invoker
        .invoke(&command)
        .await
        .map_err(|e| stage.invoke_failed(e))?;

    stage.interpret(input, output)
}

/// The result path a tool reports: its last non-empty output line
pub fn result_path(output: &ToolOutput) -> Option<PathBuf> {
    output.lines().last().map(PathBuf::from)
}

/// Lines the generator uses to report errors
pub fn generation_errors(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.starts_with("ERROR:") || line.contains("Error in file"))
        .map(String::from)
        .collect()
}

fn conversion_failed(stage: StageName, error: InvokeError) -> PipelineError {
    PipelineError::Conversion {
        stage,
        reason: error.to_string(),
    }
}

// ============================================================================
// 1. Format conversion
// ============================================================================

/// Converts the uploaded file into the intermediate XML format
#[derive(Debug, Clone)]
pub struct FormatConversion {
    pub tool: ToolSpec,
}

impl Stage for FormatConversion {
    /// Path of the uploaded original
    type Input = PathBuf;
    type Output = ArtifactRef;

    fn name(&self) -> StageName {
        StageName::FormatConversion
    }

    fn command(&self, original: &PathBuf) -> ToolCommand {
        self.tool.command().arg(original)
    }

    fn interpret(&self, original: &PathBuf, output: ToolOutput) -> PipelineResult<ArtifactRef> {
        let path = result_path(&output).ok_or_else(|| PipelineError::Conversion {
            stage: self.name(),
            reason: format!(
                "converter produced no output for {} (exit code {:?}) {}",
                original.display(),
                output.exit_code,
                output.stderr
            )
            .trim_end()
            .to_string(),
        })?;
        Ok(ArtifactRef::from_path(path))
    }

    fn invoke_failed(&self, error: InvokeError) -> PipelineError {
        conversion_failed(self.name(), error)
    }
}

// ============================================================================
// 2. Model conversion
// ============================================================================

/// Input for the model converter
#[derive(Debug, Clone)]
pub struct ModelConversionInput {
    pub converted: PathBuf,

    /// Directory the model file should be written to
    pub destination: PathBuf,
}

/// Converts the intermediate XML into the domain model
#[derive(Debug, Clone)]
pub struct ModelConversion {
    pub tool: ToolSpec,
}

impl Stage for ModelConversion {
    type Input = ModelConversionInput;
    type Output = ArtifactRef;

    fn name(&self) -> StageName {
        StageName::ModelConversion
    }

    fn command(&self, input: &ModelConversionInput) -> ToolCommand {
        // The converter expects a trailing separator on the directory
        let mut destination = input.destination.as_os_str().to_os_string();
        destination.push(std::path::MAIN_SEPARATOR_STR);
        self.tool.command().arg(&input.converted).arg(destination)
    }

    fn interpret(
        &self,
        input: &ModelConversionInput,
        output: ToolOutput,
    ) -> PipelineResult<ArtifactRef> {
        let path = result_path(&output).ok_or_else(|| PipelineError::Conversion {
            stage: self.name(),
            reason: format!(
                "model converter produced no output for {}",
                input.converted.display()
            ),
        })?;
        // Relative answers are relative to the destination directory
        let path = if path.is_absolute() {
            path
        } else {
            input.destination.join(path)
        };
        Ok(ArtifactRef::from_path(path))
    }

    fn invoke_failed(&self, error: InvokeError) -> PipelineError {
        conversion_failed(self.name(), error)
    }
}

// ============================================================================
// 3. Code generation
// ============================================================================

/// Input for the generator
#[derive(Debug, Clone)]
pub struct CodeGenerationInput {
    pub model: PathBuf,

    /// Fresh directory the project tree is generated into
    pub destination: PathBuf,
}

/// Generates a project tree from the model
#[derive(Debug, Clone)]
pub struct CodeGeneration {
    pub tool: ToolSpec,
}

impl Stage for CodeGeneration {
    type Input = CodeGenerationInput;
    type Output = ArtifactRef;

    fn name(&self) -> StageName {
        StageName::CodeGeneration
    }

    fn command(&self, input: &CodeGenerationInput) -> ToolCommand {
        self.tool
            .command()
            .args(["-c", "auto", "-s"])
            .arg(&input.model)
            .arg("-o")
            .arg(&input.destination)
            .merge_stderr()
    }

    fn interpret(
        &self,
        input: &CodeGenerationInput,
        output: ToolOutput,
    ) -> PipelineResult<ArtifactRef> {
        // Error lines win over the exit code
        let errors = generation_errors(&output.stdout);
        if !errors.is_empty() {
            return Err(PipelineError::Generation {
                details: errors.join("\n"),
            });
        }

        if !input.destination.is_dir() {
            return Err(PipelineError::Generation {
                details: format!(
                    "generator did not create {}",
                    input.destination.display()
                ),
            });
        }

        Ok(ArtifactRef::from_path(&input.destination))
    }
}

// ============================================================================
// 4. Package
// ============================================================================

/// Builds the generated project; output is logged only
#[derive(Debug, Clone)]
pub struct Package {
    pub tool: ToolSpec,

    /// Build file relative to the project root
    pub build_descriptor: PathBuf,
}

impl Stage for Package {
    /// Generated project root
    type Input = PathBuf;
    type Output = ();

    fn name(&self) -> StageName {
        StageName::Package
    }

    fn command(&self, project_dir: &PathBuf) -> ToolCommand {
        self.tool
            .command()
            .arg("-f")
            .arg(project_dir.join(&self.build_descriptor))
            .args(["clean", "package", "-DskipTests"])
            .merge_stderr()
    }

    fn interpret(&self, project_dir: &PathBuf, output: ToolOutput) -> PipelineResult<()> {
        for line in output.stdout.lines() {
            debug!(target: "quadrat::build", "{}", line);
        }
        if output.succeeded() {
            info!(project = %project_dir.display(), elapsed = ?output.elapsed, "Package finished");
        } else {
            warn!(
                project = %project_dir.display(),
                exit_code = ?output.exit_code,
                "Package exited unsuccessfully"
            );
        }
        Ok(())
    }
}

// ============================================================================
// 5. Execute
// ============================================================================

/// Find the runnable artifact: first file in `dir` (by name) matching `pattern`
pub fn find_build_artifact(dir: &Path, pattern: &str) -> PipelineResult<PathBuf> {
    let not_found = || PipelineError::ArtifactNotFound {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
    };

    let matcher = glob::Pattern::new(pattern).map_err(|_| not_found())?;
    let entries = std::fs::read_dir(dir).map_err(|_| not_found())?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| matcher.matches(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    matches.sort();

    if matches.len() > 1 {
        warn!(
            dir = %dir.display(),
            count = matches.len(),
            "Several build artifacts match, using the first"
        );
    }
    matches.into_iter().next().ok_or_else(not_found)
}

/// Input for running the built artifact
#[derive(Debug, Clone)]
pub struct ExecuteInput {
    pub artifact: PathBuf,
    pub working_dir: PathBuf,
}

/// Runs the built artifact under the execution deadline
#[derive(Debug, Clone)]
pub struct Execute {
    pub tool: ToolSpec,
    pub deadline: std::time::Duration,

    /// Prepended to `PATH` for the child
    pub runtime_path: Option<PathBuf>,
}

impl Stage for Execute {
    type Input = ExecuteInput;
    type Output = ToolOutput;

    fn name(&self) -> StageName {
        StageName::Execute
    }

    fn command(&self, input: &ExecuteInput) -> ToolCommand {
        let command = self
            .tool
            .command()
            .arg(&input.artifact)
            .current_dir(&input.working_dir)
            .merge_stderr()
            .deadline(self.deadline);
        match self.runtime_path {
            Some(ref runtime) => command.prepend_path(runtime),
            None => command,
        }
    }

    fn interpret(&self, _input: &ExecuteInput, output: ToolOutput) -> PipelineResult<ToolOutput> {
        Ok(output)
    }
}

// ============================================================================
// 6. Generate images
// ============================================================================

/// Runs the visualization script under the images deadline
#[derive(Debug, Clone)]
pub struct GenerateImages {
    pub tool: ToolSpec,
    pub deadline: std::time::Duration,
}

impl Stage for GenerateImages {
    /// Working directory (the generated project, when there is one)
    type Input = Option<PathBuf>;
    type Output = ToolOutput;

    fn name(&self) -> StageName {
        StageName::GenerateImages
    }

    fn command(&self, working_dir: &Option<PathBuf>) -> ToolCommand {
        let command = self.tool.command().merge_stderr().deadline(self.deadline);
        match working_dir {
            Some(dir) => command.current_dir(dir),
            None => command,
        }
    }

    fn interpret(&self, _input: &Option<PathBuf>, output: ToolOutput) -> PipelineResult<ToolOutput> {
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn java(jar: &str) -> ToolSpec {
        ToolSpec::new("java").with_args(["-jar", jar])
    }

    #[test]
    fn test_result_path_takes_last_line() {
        let output = ToolOutput::success("Loading model...\n/tmp/u1/model_converted.xml\n\n");
        assert_eq!(
            result_path(&output),
            Some(PathBuf::from("/tmp/u1/model_converted.xml"))
        );
        assert_eq!(result_path(&ToolOutput::success("   ")), None);
    }

    #[test]
    fn test_generation_error_markers() {
        let stdout = "Compiling...\nERROR: unknown type Foo\nwarning: x\nThere is an Error in file a.thingml\nERRORS are fine mid-line";

        let errors = generation_errors(stdout);
        assert_eq!(
            errors,
            vec!["ERROR: unknown type Foo", "There is an Error in file a.thingml"]
        );
    }

    #[test]
    fn test_format_conversion() {
        let stage = FormatConversion { tool: java("conv.jar") };
        let original = PathBuf::from("/tmp/u1/model.xml");

        assert_eq!(
            stage.command(&original).to_string(),
            "java -jar conv.jar /tmp/u1/model.xml"
        );

        let artifact = stage
            .interpret(&original, ToolOutput::success("/tmp/u1/model_converted.xml"))
            .unwrap();
        assert_eq!(artifact.name, "model_converted.xml");

        let empty = stage.interpret(&original, ToolOutput::success(""));
        assert!(matches!(empty, Err(PipelineError::Conversion { .. })));
    }

    #[test]
    fn test_model_conversion_resolves_relative_result() {
        let stage = ModelConversion { tool: java("m2c.jar") };
        let input = ModelConversionInput {
            converted: PathBuf::from("/tmp/u1/model_converted.xml"),
            destination: PathBuf::from("/tmp/u1"),
        };

        let command = stage.command(&input);
        assert_eq!(command.to_string(), "java -jar m2c.jar /tmp/u1/model_converted.xml /tmp/u1/");

        let relative = stage
            .interpret(&input, ToolOutput::success("model.thingml"))
            .unwrap();
        assert_eq!(relative.path, PathBuf::from("/tmp/u1/model.thingml"));

        let absolute = stage
            .interpret(&input, ToolOutput::success("/tmp/u1/model.thingml"))
            .unwrap();
        assert_eq!(absolute.path, PathBuf::from("/tmp/u1/model.thingml"));
    }

    #[test]
    fn test_model_conversion_spawn_failure_is_conversion_error() {
        let stage = ModelConversion { tool: java("m2c.jar") };
        let error = stage.invoke_failed(InvokeError::Spawn {
            command: "java".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert!(matches!(
            error,
            PipelineError::Conversion {
                stage: StageName::ModelConversion,
                ..
            }
        ));
    }

    #[test]
    fn test_code_generation_errors_override_exit_code() {
        let temp = TempDir::new().unwrap();
        let stage = CodeGeneration { tool: java("gen.jar") };
        let input = CodeGenerationInput {
            model: PathBuf::from("/tmp/u1/model.thingml"),
            destination: temp.path().to_path_buf(),
        };

        let result = stage.interpret(&input, ToolOutput::success("ERROR: bad model"));
        match result {
            Err(PipelineError::Generation { details }) => assert_eq!(details, "ERROR: bad model"),
            other => panic!("Expected Generation error, got {:?}", other),
        }

        let ok = stage.interpret(&input, ToolOutput::success("done").with_exit_code(1));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_code_generation_requires_destination() {
        let stage = CodeGeneration { tool: java("gen.jar") };
        let input = CodeGenerationInput {
            model: PathBuf::from("/tmp/u1/model.thingml"),
            destination: PathBuf::from("/definitely/missing/dir"),
        };

        let command = stage.command(&input);
        assert!(command.to_string().contains("-c auto -s /tmp/u1/model.thingml -o /definitely/missing/dir"));

        let result = stage.interpret(&input, ToolOutput::success("all good"));
        assert!(matches!(result, Err(PipelineError::Generation { .. })));
    }

    #[test]
    fn test_package_command() {
        let stage = Package {
            tool: ToolSpec::new("mvn"),
            build_descriptor: PathBuf::from("python_java/pom.xml"),
        };
        let command = stage.command(&PathBuf::from("/p/model"));

        assert_eq!(
            command.to_string(),
            "mvn -f /p/model/python_java/pom.xml clean package -DskipTests"
        );
        assert!(command.deadline.is_none());
    }

    #[test]
    fn test_find_build_artifact() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.jar"), "").unwrap();
        std::fs::write(temp.path().join("app-with-dependencies.txt"), "").unwrap();

        let missing = find_build_artifact(temp.path(), "*with-dependencies*.jar");
        assert!(matches!(missing, Err(PipelineError::ArtifactNotFound { .. })));

        std::fs::write(temp.path().join("b-jar-with-dependencies.jar"), "").unwrap();
        std::fs::write(temp.path().join("a-jar-with-dependencies.jar"), "").unwrap();

        let found = find_build_artifact(temp.path(), "*with-dependencies*.jar").unwrap();
        assert_eq!(found, temp.path().join("a-jar-with-dependencies.jar"));
    }

    #[test]
    fn test_find_build_artifact_missing_dir() {
        let result = find_build_artifact(Path::new("/no/such/target"), "*.jar");
        assert!(matches!(result, Err(PipelineError::ArtifactNotFound { .. })));
    }

    #[test]
    fn test_execute_command_prepends_runtime_path() {
        let stage = Execute {
            tool: ToolSpec::new("java").with_args(["-jar"]),
            deadline: Duration::from_secs(5),
            runtime_path: Some(PathBuf::from("/opt/conda/bin")),
        };
        let command = stage.command(&ExecuteInput {
            artifact: PathBuf::from("/p/target/app-with-dependencies.jar"),
            working_dir: PathBuf::from("/p/target"),
        });

        assert_eq!(command.deadline, Some(Duration::from_secs(5)));
        assert_eq!(command.working_dir, Some(PathBuf::from("/p/target")));
        let path = command.env_value("PATH").unwrap();
        assert_eq!(
            std::env::split_paths(path).next(),
            Some(PathBuf::from("/opt/conda/bin"))
        );
    }
}
