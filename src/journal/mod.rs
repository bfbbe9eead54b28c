//! Run journal: the decision log and the event log.
//!
//! Both files are opened lazily on first write and closed by
//! [`Journal::close`], which every run exit path calls. Closing twice is
//! harmless. Write failures are logged and swallowed; a broken log file
//! never stops the macro.

pub mod decisions;
pub mod events;

use std::path::{Path, PathBuf};
use tracing::warn;

pub use decisions::DecisionLog;
pub use events::{EventKind, EventLog, EventResult, EventRow};

pub const LOG_FILE_NAME: &str = "sword_macro.log";
pub const DATA_FILE_NAME: &str = "sword_data.csv";
pub const STATUS_FILE_NAME: &str = "sword_macro_status.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalPaths {
    pub log: PathBuf,
    pub data: PathBuf,
    /// Shared with the overlay; lives in the temp dir by default.
    pub status: PathBuf,
}

impl JournalPaths {
    /// Log and data files in `dir`, status file in the temp dir.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            log: dir.join(LOG_FILE_NAME),
            data: dir.join(DATA_FILE_NAME),
            status: std::env::temp_dir().join(STATUS_FILE_NAME),
        }
    }

    /// Everything, status file included, in `dir`.
    pub fn all_in(dir: &Path) -> Self {
        Self {
            status: dir.join(STATUS_FILE_NAME),
            ..Self::in_dir(dir)
        }
    }

    /// The user data dir, falling back to the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("sword-macro"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub struct Journal {
    decisions: DecisionLog,
    events: EventLog,
}

impl Journal {
    pub fn new(paths: JournalPaths) -> Self {
        Self {
            decisions: DecisionLog::new(paths.log, paths.status),
            events: EventLog::new(paths.data),
        }
    }

    pub fn note(&mut self, msg: &str) {
        if let Err(e) = self.decisions.line(msg) {
            warn!(error = %e, "Failed to write decision log");
        }
    }

    /// Raw OCR block plus a one-line digest of the last three lines.
    pub fn ocr(&mut self, raw: &str) {
        if let Err(e) = self.decisions.ocr_block(raw) {
            warn!(error = %e, "Failed to write OCR block");
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.note("OCR: (no text)");
            return;
        }
        let lines: Vec<&str> = trimmed.lines().collect();
        let recent = &lines[lines.len().saturating_sub(3)..];
        self.note(&format!("OCR ({} lines): {}", lines.len(), recent.join(" | ")));
    }

    pub fn summary(&mut self, text: &str) {
        if let Err(e) = self.decisions.block(text) {
            warn!(error = %e, "Failed to write summary");
        }
    }

    pub fn record(&mut self, row: &EventRow) {
        if let Err(e) = self.events.record(row) {
            warn!(error = %e, event = row.event.as_str(), "Failed to write event row");
        }
    }

    pub fn panel(&self) -> impl Iterator<Item = &str> {
        self.decisions.panel()
    }

    pub fn close(&mut self) {
        self.decisions.close();
        self.events.close();
    }

    pub fn is_open(&self) -> bool {
        self.decisions.is_open() || self.events.is_open()
    }
}
