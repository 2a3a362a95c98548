//! Append-only operation journal.
//!
//! Events are stored as newline-delimited JSON (JSONL) in a single file so
//! the per-stage history of a project can be inspected with standard tools.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::{Event, ProjectId};

/// File-based journal using JSONL format
pub struct Journal {
    path: PathBuf,

    /// Keeps concurrent appends from interleaving
    write_lock: Mutex<()>,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the path to the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event to the log
    pub async fn append(&self, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event).context("Failed to serialize event")?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Append without failing the caller; the journal is diagnostic only
    pub async fn record(&self, event: Event) {
        if let Err(e) = self.append(&event).await {
            warn!(
                journal = %self.path.display(),
                event_type = ?event.event_type,
                "Failed to journal event: {:#}", e
            );
        }
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                // A torn final line from a crashed writer should not hide the rest
                Err(e) => warn!("Skipping unreadable journal line: {}", e),
            }
        }

        Ok(events)
    }

    /// Events recorded for one project, oldest first
    pub async fn history(&self, project_id: ProjectId) -> Result<Vec<Event>> {
        let events = self.replay().await?;
        Ok(events
            .into_iter()
            .filter(|e| e.project_id == Some(project_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventType, Operation, StageName};
    use tempfile::TempDir;

    fn event(project: u64, event_type: EventType) -> Event {
        Event::new(
            Some(ProjectId(project)),
            Operation::Generate,
            Some(StageName::CodeGeneration),
            event_type,
            "test".to_string(),
        )
    }

    #[tokio::test]
    async fn test_missing_journal_replays_empty() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::new(temp.path().join("journal.jsonl"));

        assert!(journal.replay().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_and_history() {
        let temp = TempDir::new().unwrap();
        let journal = Journal::new(temp.path().join("nested").join("journal.jsonl"));

        journal.append(&event(1, EventType::StageStarted)).await.unwrap();
        journal.append(&event(2, EventType::StageStarted)).await.unwrap();
        journal
            .append(&event(1, EventType::StageCompleted).with_duration(12))
            .await
            .unwrap();

        assert_eq!(journal.replay().await.unwrap().len(), 3);

        let history = journal.history(ProjectId(1)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, EventType::StageStarted);
        assert_eq!(history[1].event_type, EventType::StageCompleted);
        assert_eq!(history[1].duration_ms, Some(12));
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("journal.jsonl");
        let journal = Journal::new(&path);

        journal.append(&event(1, EventType::OperationStarted)).await.unwrap();
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\": \"trunc");
        std::fs::write(&path, content).unwrap();

        assert_eq!(journal.history(ProjectId(1)).await.unwrap().len(), 1);
    }
}
