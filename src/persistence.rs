//! Best-effort archiving of collaboration events and status snapshots

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::error::{OrchestratorError, Result};
use crate::orchestrator::StatusSnapshot;
use crate::types::CollaborationEvent;

/// Write-only archive. Callers log and swallow failures.
pub trait PersistenceSink: Send + Sync {
    fn archive_event(&self, event: &CollaborationEvent) -> Result<()>;

    fn archive_snapshot(&self, snapshot: &StatusSnapshot) -> Result<()>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn archive_event(&self, _event: &CollaborationEvent) -> Result<()> {
        Ok(())
    }

    fn archive_snapshot(&self, _snapshot: &StatusSnapshot) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Event(&'a CollaborationEvent),
    Snapshot(&'a StatusSnapshot),
}

/// Appends one JSON object per line to a file
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Opened persistence sink");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &Record<'_>) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|e| OrchestratorError::Persistence(format!("{}: {e}", self.path.display())))
    }
}

impl PersistenceSink for JsonLinesSink {
    fn archive_event(&self, event: &CollaborationEvent) -> Result<()> {
        self.append(&Record::Event(event))
    }

    fn archive_snapshot(&self, snapshot: &StatusSnapshot) -> Result<()> {
        self.append(&Record::Snapshot(snapshot))
    }
}
