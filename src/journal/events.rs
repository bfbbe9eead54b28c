//! Structured event log (CSV) for offline analysis.
//!
//! Append-only. The header goes in only when the file is new or empty.
//! Absent values are written as empty cells.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use tracing::debug;

use crate::types::Mode;

pub const HEADER: [&str; 10] = [
    "timestamp",
    "event",
    "level",
    "result",
    "gold",
    "item",
    "mode",
    "cycle_id",
    "cycle_sec",
    "gold_earned",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Enhance,
    Sell,
    Farm,
    Goal,
    CycleEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Enhance => "enhance",
            EventKind::Sell => "sell",
            EventKind::Farm => "farm",
            EventKind::Goal => "goal",
            EventKind::CycleEnd => "cycle_end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Success,
    Hold,
    Destroy,
    Trash,
    Hidden,
    Reached,
}

impl EventResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventResult::Success => "success",
            EventResult::Hold => "hold",
            EventResult::Destroy => "destroy",
            EventResult::Trash => "trash",
            EventResult::Hidden => "hidden",
            EventResult::Reached => "reached",
        }
    }
}

/// One CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub at: DateTime<Local>,
    pub event: EventKind,
    pub level: Option<u32>,
    pub result: Option<EventResult>,
    pub gold: Option<u64>,
    pub item: Option<String>,
    pub mode: Option<Mode>,
    /// 0 before the first cycle opens; written blank.
    pub cycle_id: u32,
    pub cycle_secs: Option<f64>,
    pub gold_earned: Option<i64>,
}

impl EventRow {
    pub fn new(event: EventKind) -> Self {
        Self {
            at: Local::now(),
            event,
            level: None,
            result: None,
            gold: None,
            item: None,
            mode: None,
            cycle_id: 0,
            cycle_secs: None,
            gold_earned: None,
        }
    }

    pub fn fields(&self) -> [String; 10] {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        [
            self.at.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.event.as_str().to_string(),
            opt(&self.level),
            self.result.map(|r| r.as_str().to_string()).unwrap_or_default(),
            opt(&self.gold),
            self.item.clone().unwrap_or_default(),
            self.mode.map(|m| m.as_str().to_string()).unwrap_or_default(),
            if self.cycle_id > 0 {
                self.cycle_id.to_string()
            } else {
                String::new()
            },
            self.cycle_secs.map(|s| format!("{s:.1}")).unwrap_or_default(),
            opt(&self.gold_earned),
        ]
    }
}

pub struct EventLog {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>> {
        let writer = match self.writer.take() {
            Some(w) => w,
            None => self.open()?,
        };
        Ok(self.writer.insert(writer))
    }

    fn open(&self) -> Result<csv::Writer<File>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir {}", parent.display()))?;
        }
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open event log {}", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(HEADER)?;
            writer.flush()?;
            debug!(path = %self.path.display(), "Event log created");
        }
        Ok(writer)
    }

    pub fn record(&mut self, row: &EventRow) -> Result<()> {
        let writer = self.writer()?;
        writer.write_record(row.fields())?;
        writer.flush()?;
        Ok(())
    }

    /// Flush and drop the writer. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
