//! Clipboard-verified chat input.
//!
//! Chat clients drop or mangle typed Hangul, so commands go in by
//! clipboard paste. The clipboard is read back before pasting and the
//! paste only happens once it holds exactly the command.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::layout::Point;
use super::Input;
use crate::config::MacroConfig;
use crate::control::ControlSignal;
use crate::engine::delay::secs;
use crate::types::MacroError;

/// Copy/read-back attempts before the turn is skipped.
pub const PASTE_ATTEMPTS: usize = 5;
/// Longer read-backs are clipboard garbage, never a command.
pub const MAX_CLIPBOARD_CHARS: usize = 20;

/// Logical keys; the desktop maps them onto the platform modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    SelectAll,
    Paste,
    Backspace,
    Enter,
}

/// Low-level desktop operations.
#[cfg_attr(test, mockall::automock)]
pub trait Desktop: Send + Sync {
    fn click(&self, at: Point) -> Result<(), MacroError>;
    fn press(&self, key: Key) -> Result<(), MacroError>;
    fn set_clipboard(&self, text: &str) -> Result<(), MacroError>;
    fn clipboard(&self) -> Result<String, MacroError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputTiming {
    /// Between keystrokes.
    pub input_delay: Duration,
    /// After each copy, before reading the clipboard back.
    pub clipboard_delay: Duration,
}

impl InputTiming {
    pub fn from_config(cfg: &MacroConfig) -> Self {
        Self {
            input_delay: secs(cfg.input_delay),
            clipboard_delay: secs(cfg.clipboard_delay),
        }
    }
}

pub struct ClipboardInput<D> {
    desktop: D,
    timing: InputTiming,
    control: ControlSignal,
}

impl<D: Desktop> ClipboardInput<D> {
    pub fn new(desktop: D, timing: InputTiming, control: ControlSignal) -> Self {
        Self {
            desktop,
            timing,
            control,
        }
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    async fn pause(&self) {
        tokio::time::sleep(self.timing.input_delay).await;
    }

    /// Copy `text` until the clipboard reads back exactly `text`.
    async fn settle_clipboard(&self, text: &str) -> Result<bool, MacroError> {
        self.desktop.set_clipboard("")?;
        for attempt in 1..=PASTE_ATTEMPTS {
            self.control.check()?;
            self.desktop.set_clipboard(text)?;
            tokio::time::sleep(self.timing.clipboard_delay).await;

            let read_back = self.desktop.clipboard()?;
            let read_back = read_back.trim();
            if read_back.chars().count() > MAX_CLIPBOARD_CHARS {
                debug!(attempt, len = read_back.len(), "Clipboard holds garbage, clearing");
                self.desktop.set_clipboard("")?;
                continue;
            }
            if read_back == text {
                return Ok(true);
            }
            debug!(attempt, read_back, "Clipboard not settled yet");
        }
        Ok(false)
    }
}

#[async_trait]
impl<D: Desktop> Input for ClipboardInput<D> {
    async fn send_command(&self, text: &str, at: Point) -> Result<bool, MacroError> {
        self.control.check()?;

        self.desktop.click(at)?;
        self.pause().await;
        self.desktop.press(Key::SelectAll)?;
        self.pause().await;
        self.desktop.press(Key::Backspace)?;
        self.pause().await;

        if !self.settle_clipboard(text).await? {
            warn!(command = text, attempts = PASTE_ATTEMPTS, "Clipboard never settled, turn skipped");
            return Ok(false);
        }

        self.pause().await;
        self.desktop.press(Key::Paste)?;
        self.pause().await;
        self.desktop.press(Key::Enter)?;
        self.pause().await;
        self.desktop.press(Key::Enter)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
