//! Core orchestration logic.
//!
//! This module contains:
//! - Stages: the catalog of tool invocations and their output rules
//! - Guard: deadline enforcement with partial output capture
//! - Journal: append-only operation log
//! - Pipeline: tool, layout and limit settings
//! - Orchestrator: the project operations

pub mod error;
pub mod guard;
pub mod journal;
pub mod locks;
pub mod orchestrator;
pub mod pipeline;
pub mod stages;

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};
pub use guard::{ExecutionGuard, RunOutcome};
pub use journal::Journal;
pub use locks::ProjectLocks;
pub use orchestrator::{Archive, Download, ExecutionReport, Orchestrator};
pub use pipeline::{ExecutionLimits, Layout, PipelineSettings, ToolSet};
pub use stages::{find_build_artifact, generation_errors, result_path, run_stage, Stage};
