//! Free-text decision log.
//!
//! One timestamped line per decision, raw OCR blocks, and the session
//! summary. The file is capped: when it is opened and already larger
//! than [`LOG_MAX_BYTES`] it is moved to `<name>.bak`, replacing any
//! older backup. The last [`PANEL_LINES`] lines are mirrored into a
//! status file for the overlay to poll.

use anyhow::{Context, Result};
use chrono::Local;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const PANEL_LINES: usize = 25;

const BANNER_WIDTH: usize = 60;

pub struct DecisionLog {
    path: PathBuf,
    status_path: PathBuf,
    max_bytes: u64,
    file: Option<File>,
    panel: VecDeque<String>,
}

impl DecisionLog {
    pub fn new(path: impl Into<PathBuf>, status_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status_path: status_path.into(),
            max_bytes: LOG_MAX_BYTES,
            file: None,
            panel: VecDeque::with_capacity(PANEL_LINES),
        }
    }

    /// Override the rotation threshold.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&mut self) -> Result<&mut File> {
        let file = match self.file.take() {
            Some(f) => f,
            None => self.open_fresh()?,
        };
        Ok(self.file.insert(file))
    }

    fn open_fresh(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
        }
        rotate_if_oversized(&self.path, self.max_bytes)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open decision log {}", self.path.display()))?;

        let rule = "=".repeat(BANNER_WIDTH);
        writeln!(file, "\n{rule}")?;
        writeln!(file, "[{}] session start", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "{rule}")?;
        file.flush()?;
        debug!(path = %self.path.display(), "Decision log opened");
        Ok(file)
    }

    /// Append a decision line and refresh the status panel.
    ///
    /// Returns the short `[HH:MM:SS] msg` form shown on the panel.
    pub fn line(&mut self, msg: &str) -> Result<String> {
        let now = Local::now();
        let short = format!("[{}] {msg}", now.format("%H:%M:%S"));

        self.panel.push_back(short.clone());
        while self.panel.len() > PANEL_LINES {
            self.panel.pop_front();
        }
        self.write_status();

        let stamp = now.format("%Y-%m-%d %H:%M:%S");
        let file = self.file()?;
        writeln!(file, "[{stamp}] {msg}")?;
        file.flush()?;
        Ok(short)
    }

    /// Dump the raw recognizer output between markers.
    pub fn ocr_block(&mut self, raw: &str) -> Result<()> {
        let stamp = Local::now().format("%H:%M:%S");
        let body = raw.trim();
        let body = if body.is_empty() { "(empty)" } else { body };
        let file = self.file()?;
        writeln!(file, "--- OCR RAW [{stamp}] ---")?;
        writeln!(file, "{body}")?;
        writeln!(file, "--- OCR END ---")?;
        file.flush()?;
        Ok(())
    }

    /// Append a multi-line block as is.
    pub fn block(&mut self, text: &str) -> Result<()> {
        let file = self.file()?;
        writeln!(file, "{text}")?;
        file.flush()?;
        Ok(())
    }

    pub fn panel(&self) -> impl Iterator<Item = &str> {
        self.panel.iter().map(String::as_str)
    }

    /// Status file write errors are ignored; the overlay just goes stale.
    fn write_status(&self) {
        let body = self.panel.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
        let _ = fs::write(&self.status_path, body);
    }

    /// Flush and drop the handle. Safe to call repeatedly; the next
    /// write reopens the file.
    pub fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
            debug!(path = %self.path.display(), "Decision log closed");
        }
    }
}

/// `sword_macro.log` → `sword_macro.log.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Move `path` to its backup when it has grown past `max_bytes`.
/// Returns whether a rotation happened.
pub fn rotate_if_oversized(path: &Path, max_bytes: u64) -> Result<bool> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= max_bytes {
        return Ok(false);
    }

    let bak = backup_path(path);
    if bak.exists() {
        fs::remove_file(&bak)
            .with_context(|| format!("Failed to remove old backup {}", bak.display()))?;
    }
    fs::rename(path, &bak)
        .with_context(|| format!("Failed to rotate {} to {}", path.display(), bak.display()))?;
    debug!(path = %path.display(), size, "Decision log rotated");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_line_writes_banner_once() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sword_macro.log");
        let mut log = DecisionLog::new(&path, dir.path().join("status.txt"));

        log.line("first")?;
        log.line("second")?;
        let body = fs::read_to_string(&path)?;
        assert_eq!(body.matches("session start").count(), 1);
        assert!(body.contains("] first\n"));
        assert!(body.contains("] second\n"));
        Ok(())
    }

    #[test]
    fn test_ocr_block_markers() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sword_macro.log");
        let mut log = DecisionLog::new(&path, dir.path().join("status.txt"));

        log.ocr_block("  \n")?;
        log.ocr_block("[+3] 강화 성공\n")?;
        let body = fs::read_to_string(&path)?;
        assert!(body.contains("--- OCR RAW ["));
        assert!(body.contains("(empty)\n--- OCR END ---"));
        assert!(body.contains("[+3] 강화 성공\n--- OCR END ---"));
        Ok(())
    }

    #[test]
    fn test_status_panel_keeps_last_lines() -> Result<()> {
        let dir = tempdir()?;
        let status = dir.path().join("status.txt");
        let mut log = DecisionLog::new(dir.path().join("sword_macro.log"), &status);

        for i in 0..30 {
            log.line(&format!("decision {i}"))?;
        }
        assert_eq!(log.panel().count(), PANEL_LINES);

        let body = fs::read_to_string(&status)?;
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), PANEL_LINES);
        assert!(lines[0].ends_with("decision 5"));
        assert!(lines[PANEL_LINES - 1].ends_with("decision 29"));
        Ok(())
    }

    #[test]
    fn test_rotation_replaces_old_backup() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sword_macro.log");
        let bak = backup_path(&path);
        fs::write(&path, "x".repeat(64))?;
        fs::write(&bak, "stale backup")?;

        let mut log = DecisionLog::new(&path, dir.path().join("status.txt")).with_max_bytes(32);
        log.line("fresh")?;

        assert_eq!(fs::read_to_string(&bak)?, "x".repeat(64));
        let body = fs::read_to_string(&path)?;
        assert!(body.contains("fresh"));
        assert!(!body.contains("xxxx"));
        Ok(())
    }

    #[test]
    fn test_small_log_not_rotated() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sword_macro.log");
        fs::write(&path, "short")?;
        assert!(!rotate_if_oversized(&path, LOG_MAX_BYTES)?);
        assert!(!rotate_if_oversized(&dir.path().join("missing.log"), 0)?);
        assert!(!backup_path(&path).exists());
        Ok(())
    }

    #[test]
    fn test_close_is_idempotent_and_reopens() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sword_macro.log");
        let mut log = DecisionLog::new(&path, dir.path().join("status.txt"));

        log.line("one")?;
        assert!(log.is_open());
        log.close();
        log.close();
        assert!(!log.is_open());

        log.line("two")?;
        let body = fs::read_to_string(&path)?;
        assert_eq!(body.matches("session start").count(), 2);
        Ok(())
    }

    #[test]
    fn test_status_write_failure_ignored() -> Result<()> {
        let dir = tempdir()?;
        let mut log = DecisionLog::new(
            dir.path().join("sword_macro.log"),
            dir.path().join("no_such_dir").join("status.txt"),
        );
        log.line("still logged")?;
        Ok(())
    }
}
