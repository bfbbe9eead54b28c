//! Platform collaborators.
//!
//! One capability trait per collaborator the engine drives: screen
//! capture, text recognition, chat input and the on-screen overlay.
//! Implementations are chosen once at startup. [`replay`] provides a
//! dry-run set that needs no desktop at all.

pub mod input;
pub mod layout;
pub mod replay;

use async_trait::async_trait;

use crate::types::MacroError;
pub use input::{ClipboardInput, Desktop, InputTiming, Key};
pub use layout::{Layout, Point, Region};

/// Raw pixels from one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub region: Region,
    /// Tightly packed RGBA rows.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// All-black frame covering `region`.
    pub fn blank(region: Region) -> Self {
        let len = region.width as usize * region.height as usize * 4;
        Self {
            region,
            pixels: vec![0; len],
        }
    }
}

/// Grabs a rectangle of the screen.
#[async_trait]
pub trait Capture: Send + Sync {
    /// `Ok(None)` when capture is impossible right now; that is not an error.
    async fn capture_region(&self, region: Region) -> Result<Option<Frame>, MacroError>;
}

/// Turns a frame into text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// One-time setup before the first recognition. Must be idempotent.
    async fn init(&self) -> Result<(), MacroError>;

    /// Lines top to bottom; empty when nothing was recognized.
    async fn recognize_text(&self, frame: &Frame) -> Result<String, MacroError>;
}

/// Types chat commands into the game.
#[async_trait]
pub trait Input: Send + Sync {
    /// Click `at`, clear the box, paste `text` and submit it.
    ///
    /// Returns `Ok(false)` when the clipboard never settled and the turn
    /// was skipped; that is not an error.
    async fn send_command(&self, text: &str, at: Point) -> Result<bool, MacroError>;
}

/// Marks the capture and input areas on screen.
pub trait Overlay: Send + Sync {
    fn show_at(&self, click: Point);
    fn hide(&self);
}
