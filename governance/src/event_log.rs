//! Append-only JSONL audit trail.
//!
//! Each component writes `{timestamp, event_type, data}` lines to its own
//! file. The trail is informational; in-memory state stays authoritative and
//! write failures never reach governance logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::types::Result;

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the event was logged
    pub timestamp: DateTime<Utc>,
    /// Event name, e.g. `bond_imposed`
    pub event_type: String,
    /// Event payload
    pub data: serde_json::Value,
}

/// JSONL writer shared by clones.
#[derive(Clone)]
pub struct EventLog {
    writer: Option<Arc<Mutex<BufWriter<File>>>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// A log that discards everything.
    pub fn disabled() -> Self {
        Self {
            writer: None,
            path: None,
        }
    }

    /// Open (or create) a log file in append mode.
    pub fn to_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Event log opened");

        Ok(Self {
            writer: Some(Arc::new(Mutex::new(BufWriter::new(file)))),
            path: Some(path),
        })
    }

    /// Open `<dir>/<component>.jsonl`, or a disabled log when no directory
    /// is configured.
    pub fn for_component(dir: Option<&str>, component: &str) -> Result<Self> {
        match dir {
            Some(dir) => Self::to_file(Path::new(dir).join(format!("{}.jsonl", component))),
            None => Ok(Self::disabled()),
        }
    }

    /// Whether records are written anywhere.
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Path of the backing file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a record.
    pub async fn record(&self, timestamp: DateTime<Utc>, event_type: &str, data: impl Serialize) {
        let Some(writer) = &self.writer else {
            return;
        };

        let record = LogRecord {
            timestamp,
            event_type: event_type.to_string(),
            data: match serde_json::to_value(data) {
                Ok(value) => value,
                Err(e) => {
                    error!(event_type, error = %e, "Failed to serialize event log payload");
                    return;
                }
            },
        };

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!(event_type, error = %e, "Failed to serialize event log record");
                return;
            }
        };

        let mut writer = writer.lock().await;
        if let Err(e) = writeln!(writer, "{}", line) {
            error!(event_type, error = %e, "Failed to write event log record");
            return;
        }
        if let Err(e) = writer.flush() {
            error!(event_type, error = %e, "Failed to flush event log");
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("path", &self.path).finish()
    }
}
