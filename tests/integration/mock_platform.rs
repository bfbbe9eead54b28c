//! Mock collaborators for integration testing.
//!
//! Deterministic, in-memory stand-ins for capture, recognition, input
//! and the overlay. Each mock hands out a cloneable handle so test code
//! can feed screens and inspect what the engine did after the engine has
//! taken ownership of the boxed collaborator.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use sword_macro::control::ControlSignal;
use sword_macro::engine::Collaborators;
use sword_macro::platform::{Capture, Frame, Input, Overlay, Point, Recognizer, Region};
use sword_macro::types::MacroError;

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Always returns a blank frame, or nothing when `unavailable` is set.
#[derive(Clone, Default)]
pub struct MockCapture {
    pub regions: Arc<Mutex<Vec<Region>>>,
    pub unavailable: bool,
}

#[async_trait]
impl Capture for MockCapture {
    async fn capture_region(&self, region: Region) -> Result<Option<Frame>, MacroError> {
        self.regions.lock().unwrap().push(region);
        if self.unavailable {
            return Ok(None);
        }
        Ok(Some(Frame::blank(region)))
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

/// Chat screens in the order the engine will read them. When the script
/// runs dry the run is interrupted so no test can spin forever.
#[derive(Clone)]
pub struct MockRecognizer {
    screens: Arc<Mutex<VecDeque<String>>>,
    control: ControlSignal,
    pub inits: Arc<AtomicU32>,
    pub reads: Arc<AtomicU32>,
    /// Read number (1-based) after which the macro gets paused; 0 = never.
    pub pause_after_read: Arc<AtomicU32>,
}

impl MockRecognizer {
    pub fn new(control: &ControlSignal) -> Self {
        Self {
            screens: Arc::new(Mutex::new(VecDeque::new())),
            control: control.clone(),
            inits: Arc::new(AtomicU32::new(0)),
            reads: Arc::new(AtomicU32::new(0)),
            pause_after_read: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn push<S: Into<String>>(&self, screens: impl IntoIterator<Item = S>) {
        self.screens
            .lock()
            .unwrap()
            .extend(screens.into_iter().map(Into::into));
    }

    pub fn remaining(&self) -> usize {
        self.screens.lock().unwrap().len()
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn init(&self) -> Result<(), MacroError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn recognize_text(&self, _frame: &Frame) -> Result<String, MacroError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.pause_after_read.load(Ordering::SeqCst) {
            self.control.set_paused(true);
        }
        match self.screens.lock().unwrap().pop_front() {
            Some(screen) => Ok(screen),
            None => {
                self.control.interrupt();
                Ok(String::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Records every command with the (virtual) time it was sent.
#[derive(Clone, Default)]
pub struct RecordingInput {
    pub sent: Arc<Mutex<Vec<(String, Point, Instant)>>>,
    /// When set, every send reports a skipped turn.
    pub clipboard_broken: bool,
}

impl RecordingInput {
    pub fn commands(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _, _)| c.clone())
            .collect()
    }
}

#[async_trait]
impl Input for RecordingInput {
    async fn send_command(&self, text: &str, at: Point) -> Result<bool, MacroError> {
        if self.clipboard_broken {
            return Ok(false);
        }
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), at, Instant::now()));
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct CountingOverlay {
    pub shown: Arc<AtomicU32>,
    pub hidden: Arc<AtomicU32>,
}

impl Overlay for CountingOverlay {
    fn show_at(&self, _click: Point) {
        self.shown.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Handles kept by the test after the collaborators move into the engine.
#[derive(Clone)]
pub struct Mocks {
    pub capture: MockCapture,
    pub ocr: MockRecognizer,
    pub input: RecordingInput,
    pub overlay: CountingOverlay,
}

impl Mocks {
    pub fn new(control: &ControlSignal) -> Self {
        Self {
            capture: MockCapture::default(),
            ocr: MockRecognizer::new(control),
            input: RecordingInput::default(),
            overlay: CountingOverlay::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            capture: Box::new(self.capture.clone()),
            recognizer: Box::new(self.ocr.clone()),
            input: Box::new(self.input.clone()),
            overlay: Box::new(self.overlay.clone()),
        }
    }
}
