//! Dry-run collaborators.
//!
//! Lets the whole engine run without a desktop: captures are blank
//! frames, recognized text comes from a transcript of recorded chat
//! screens, and keystrokes are logged instead of sent.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

use super::input::{Desktop, Key};
use super::layout::{Point, Region};
use super::{Capture, Frame, Overlay, Recognizer};
use crate::control::ControlSignal;
use crate::types::MacroError;

/// Line that separates screens in a transcript file.
pub const FRAME_SEPARATOR: &str = "---";

/// Split a transcript into screens. A screen may be empty, which
/// replays as "nothing recognized".
pub fn parse_transcript(text: &str) -> Vec<String> {
    let mut frames = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim() == FRAME_SEPARATOR {
            frames.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        frames.push(current.join("\n"));
    }
    frames
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BlankCapture;

#[async_trait]
impl Capture for BlankCapture {
    async fn capture_region(&self, region: Region) -> Result<Option<Frame>, MacroError> {
        Ok(Some(Frame::blank(region)))
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

/// Returns recorded screens in order.
///
/// When the transcript runs out it raises an interrupt on the attached
/// control signal, if any, so a replayed run ends with a summary.
pub struct ScriptedRecognizer {
    frames: Mutex<VecDeque<String>>,
    on_exhausted: Option<ControlSignal>,
}

impl ScriptedRecognizer {
    pub fn new<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            frames: Mutex::new(frames.into_iter().map(Into::into).collect()),
            on_exhausted: None,
        }
    }

    pub fn from_transcript(text: &str) -> Self {
        Self::new(parse_transcript(text))
    }

    pub fn stop_when_exhausted(mut self, control: ControlSignal) -> Self {
        self.on_exhausted = Some(control);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn init(&self) -> Result<(), MacroError> {
        debug!(frames = self.remaining(), "Replay recognizer ready");
        Ok(())
    }

    async fn recognize_text(&self, _frame: &Frame) -> Result<String, MacroError> {
        let next = self
            .frames
            .lock()
            .map_err(|_| MacroError::Recognizer("transcript lock poisoned".into()))?
            .pop_front();
        match next {
            Some(text) => Ok(text),
            None => {
                if let Some(control) = &self.on_exhausted {
                    info!("Transcript exhausted, ending replay");
                    control.interrupt();
                }
                Ok(String::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Desktop
// ---------------------------------------------------------------------------

/// Logs every keystroke and keeps an in-memory clipboard.
#[derive(Debug, Default)]
pub struct LoggingDesktop {
    clipboard: Mutex<String>,
}

impl LoggingDesktop {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Desktop for LoggingDesktop {
    fn click(&self, at: Point) -> Result<(), MacroError> {
        debug!(%at, "[DRY RUN] Would click");
        Ok(())
    }

    fn press(&self, key: Key) -> Result<(), MacroError> {
        debug!(?key, "[DRY RUN] Would press");
        if key == Key::Paste {
            let text = self.clipboard()?;
            info!(command = %text, "[DRY RUN] Would send command");
        }
        Ok(())
    }

    fn set_clipboard(&self, text: &str) -> Result<(), MacroError> {
        let mut clip = self
            .clipboard
            .lock()
            .map_err(|_| MacroError::Input("clipboard lock poisoned".into()))?;
        clip.clear();
        clip.push_str(text);
        Ok(())
    }

    fn clipboard(&self) -> Result<String, MacroError> {
        self.clipboard
            .lock()
            .map(|c| c.clone())
            .map_err(|_| MacroError::Input("clipboard lock poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LogOverlay;

impl Overlay for LogOverlay {
    fn show_at(&self, click: Point) {
        info!(%click, "[DRY RUN] Overlay shown");
    }

    fn hide(&self) {
        debug!("[DRY RUN] Overlay hidden");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::input::{ClipboardInput, InputTiming};
    use crate::platform::Input;
    use std::time::Duration;

    fn region() -> Region {
        Region {
            x: 0,
            y: 0,
            width: 2,
            height: 3,
        }
    }

    #[test]
    fn test_parse_transcript() {
        let text = "\n---\n새로운 검 획득: 낡은 검\n남은 골드: 100G\n---\n[+1] 강화 성공";
        let frames = parse_transcript(text);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], "");
        assert_eq!(frames[1], "새로운 검 획득: 낡은 검\n남은 골드: 100G");
        assert_eq!(frames[2], "[+1] 강화 성공");
    }

    #[test]
    fn test_parse_transcript_trailing_separator() {
        let frames = parse_transcript("a\n---\n");
        assert_eq!(frames, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_capture_size() {
        let frame = BlankCapture.capture_region(region()).await.unwrap().unwrap();
        assert_eq!(frame.pixels.len(), 2 * 3 * 4);
    }

    #[tokio::test]
    async fn test_scripted_recognizer_order_and_exhaustion() {
        let control = ControlSignal::new();
        let ocr = ScriptedRecognizer::new(["one", "two"]).stop_when_exhausted(control.clone());
        let frame = Frame::blank(region());
        ocr.init().await.unwrap();

        assert_eq!(ocr.recognize_text(&frame).await.unwrap(), "one");
        assert_eq!(ocr.recognize_text(&frame).await.unwrap(), "two");
        assert!(!control.interrupted());
        assert_eq!(ocr.recognize_text(&frame).await.unwrap(), "");
        assert!(control.interrupted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logging_desktop_satisfies_clipboard_check() {
        let input = ClipboardInput::new(
            LoggingDesktop::new(),
            InputTiming {
                input_delay: Duration::from_millis(120),
                clipboard_delay: Duration::from_millis(300),
            },
            ControlSignal::new(),
        );
        assert!(input.send_command("/판매", Point::new(5, 5)).await.unwrap());
        assert_eq!(input.desktop().clipboard().unwrap(), "/판매");
    }
}
