//! Journal events for operations and their stages.
//!
//! Every operation and stage transition is recorded as an immutable event in
//! an append-only log, so the per-stage history of a project can be replayed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectId;

/// A single entry in the operation journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The project this event belongs to (unknown until `add` persists it)
    pub project_id: Option<ProjectId>,

    /// Operation that produced the event
    pub operation: Operation,

    /// Stage name (stage events only)
    pub stage: Option<StageName>,

    /// Type of event
    pub event_type: EventType,

    /// Human-readable summary
    pub summary: String,

    /// Time taken in milliseconds (for finished stages)
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl Event {
    /// Create a new event with the current timestamp
    pub fn new(
        project_id: Option<ProjectId>,
        operation: Operation,
        stage: Option<StageName>,
        event_type: EventType,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            project_id,
            operation,
            stage,
            event_type,
            summary,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// User-triggered operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Update,
    Generate,
    Execute,
    GenerateImages,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Generate => "generate",
            Self::Execute => "execute",
            Self::GenerateImages => "generate-images",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Pipeline stages, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    FormatConversion,
    ModelConversion,
    CodeGeneration,
    Package,
    Execute,
    GenerateImages,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FormatConversion => "format-conversion",
            Self::ModelConversion => "model-conversion",
            Self::CodeGeneration => "code-generation",
            Self::Package => "package",
            Self::Execute => "execute",
            Self::GenerateImages => "generate-images",
        };
        f.write_str(name)
    }
}

/// Types of journal events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OperationStarted,
    OperationCompleted,
    OperationFailed,
    StageStarted,
    StageCompleted,
    StageFailed,

    /// Deadline elapsed; the process was killed and partial output kept
    StageTimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::new(
            Some(ProjectId(3)),
            Operation::Generate,
            Some(StageName::CodeGeneration),
            EventType::StageStarted,
            "Stage 'code-generation' started".to_string(),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"stage_started\""));
        assert!(json.contains("\"code_generation\""));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event_type, EventType::StageStarted);
        assert_eq!(parsed.project_id, Some(ProjectId(3)));
    }

    #[test]
    fn test_event_builders() {
        let event = Event::new(
            None,
            Operation::Add,
            Some(StageName::FormatConversion),
            EventType::StageFailed,
            "failed".to_string(),
        )
        .with_duration(1500)
        .with_error("converter crashed".to_string());

        assert_eq!(event.duration_ms, Some(1500));
        assert_eq!(event.error.as_deref(), Some("converter crashed"));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Operation::GenerateImages.to_string(), "generate-images");
        assert_eq!(StageName::ModelConversion.to_string(), "model-conversion");
    }
}
