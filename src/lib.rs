//! quadrat - build pipeline from uploaded models to running projects
//!
//! An uploaded model file is converted twice (format conversion, then model
//! conversion), turned into a generated project tree, packaged and executed.
//! Every step shells out to an external tool.
//!
//! # Architecture
//!
//! - Stages are pure descriptions of one tool invocation and how to read its
//!   output back into the next artifact
//! - The orchestrator runs stages in order and persists the project record
//!   only after an operation succeeds
//! - Long-running stages run under a deadline; a killed process still leaves
//!   its partial output behind
//! - Every operation and stage is recorded in an append-only journal
//!
//! # Modules
//!
//! - `adapters`: External tool invocation (process runner)
//! - `core`: Orchestration logic (Stages, Guard, Journal, Orchestrator)
//! - `domain`: Data structures (Project, ArtifactRef, Event, User)
//! - `storage`: File storage collaborator and archives
//! - `store`: Project record store
//! - `identity`: Who is making the request
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Upload and convert a model
//! quadrat --user alice add model.xml
//!
//! # Generate and run it
//! quadrat --user alice generate 1
//! quadrat --user alice execute 1
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod identity;
pub mod storage;
pub mod store;

// Re-export main types at crate root for convenience
pub use adapters::{InvokeError, ProcessInvoker, ToolCommand, ToolInvoker, ToolOutput, ToolSpec};
pub use core::{Orchestrator, PipelineError, PipelineSettings, RunOutcome};
pub use domain::{ArtifactRef, Event, EventType, Project, ProjectId, User, UserId, Workspace};
pub use identity::{Identity, StaticIdentity};
pub use storage::{LocalStorage, Storage, Upload};
pub use store::{JsonProjectStore, MemoryProjectStore, ProjectStore};
