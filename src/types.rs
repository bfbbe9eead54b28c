//! Shared types for the sword macro.
//!
//! These types form the data model used across all modules: the run
//! mode, the events read off the chat window, the engine state and the
//! domain error. They carry no behaviour beyond formatting so that the
//! classifier, engine and journal can depend on them without cycles.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// What a run is trying to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Enhance the sword in hand up to a target level, then stop.
    ReachLevel,
    /// Farm until a non-trash sword drops, then enhance it.
    HuntHidden,
    /// Farm, enhance to the mining target, sell, repeat forever.
    MineGold,
}

impl Mode {
    /// Menu key for this mode ("1", "2", "3").
    pub fn menu_key(&self) -> &'static str {
        match self {
            Mode::ReachLevel => "1",
            Mode::HuntHidden => "2",
            Mode::MineGold => "3",
        }
    }

    pub fn from_menu_key(key: &str) -> Option<Self> {
        match key.trim() {
            "1" => Some(Mode::ReachLevel),
            "2" => Some(Mode::HuntHidden),
            "3" => Some(Mode::MineGold),
            _ => None,
        }
    }

    /// Short tag written to the event log's `mode` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ReachLevel => "target",
            Mode::HuntHidden => "hidden",
            Mode::MineGold => "money",
        }
    }

    /// Hidden hunting and gold mining open on the farming stage.
    pub fn starts_farming(&self) -> bool {
        !matches!(self, Mode::ReachLevel)
    }

    /// Whether a destroyed sword sends the run back to farming.
    pub fn tracks_destroy(&self) -> bool {
        self.starts_farming()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::ReachLevel => write!(f, "Reach level"),
            Mode::HuntHidden => write!(f, "Hunt hidden"),
            Mode::MineGold => write!(f, "Mine gold"),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat events
// ---------------------------------------------------------------------------

/// Result keyword attached to an enhancement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Hold,
    Destroy,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Hold => "hold",
            Outcome::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one capture of the chat window says happened.
///
/// Produced fresh every turn and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrEvent {
    /// Nothing readable on screen.
    Empty,
    /// The game refused to buy the sword (unenhanced or worthless).
    SaleBlocked,
    /// A new sword dropped. `trash` marks denylisted/worn drops.
    ItemDropped { name: String, trash: bool },
    /// The game reported not enough gold to enhance.
    InsufficientFunds,
    /// An enhancement result. `level` is the latest `[+N]` on screen.
    EnhanceOutcome {
        level: Option<u32>,
        outcome: Option<Outcome>,
    },
    /// The goal marker is on screen, or the parsed level meets the target.
    GoalReached {
        level: Option<u32>,
        outcome: Option<Outcome>,
    },
    /// Text was present but matched nothing the engine understands.
    Undecided,
}

impl OcrEvent {
    /// Outcome keyword carried by an enhancement or goal event.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            OcrEvent::EnhanceOutcome { outcome, .. } | OcrEvent::GoalReached { outcome, .. } => {
                *outcome
            }
            _ => None,
        }
    }

    /// Level carried by an enhancement or goal event.
    pub fn level(&self) -> Option<u32> {
        match self {
            OcrEvent::EnhanceOutcome { level, .. } | OcrEvent::GoalReached { level, .. } => *level,
            _ => None,
        }
    }
}

impl fmt::Display for OcrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrEvent::Empty => write!(f, "empty"),
            OcrEvent::SaleBlocked => write!(f, "sale blocked"),
            OcrEvent::ItemDropped { name, trash: true } => write!(f, "trash drop ({name})"),
            OcrEvent::ItemDropped { name, trash: false } => write!(f, "hidden drop ({name})"),
            OcrEvent::InsufficientFunds => write!(f, "insufficient gold"),
            OcrEvent::EnhanceOutcome { level, outcome } => {
                write!(f, "enhance")?;
                if let Some(l) = level {
                    write!(f, " +{l}")?;
                }
                if let Some(o) = outcome {
                    write!(f, " ({o})")?;
                }
                Ok(())
            }
            OcrEvent::GoalReached { level, .. } => match level {
                Some(l) => write!(f, "goal reached (+{l})"),
                None => write!(f, "goal reached"),
            },
            OcrEvent::Undecided => write!(f, "undecided"),
        }
    }
}

/// One classified capture: the event plus the gold balance, which is
/// parsed independently of which event fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub gold: Option<u64>,
    pub event: OcrEvent,
}

impl Reading {
    pub fn new(event: OcrEvent) -> Self {
        Self { gold: None, event }
    }

    pub fn with_gold(mut self, gold: u64) -> Self {
        self.gold = Some(gold);
        self
    }
}

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

/// Why a run reached the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    GoalReached,
    InsufficientFunds,
    GoldFloor,
    TimeLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::GoalReached => write!(f, "goal reached"),
            StopReason::InsufficientFunds => write!(f, "insufficient gold"),
            StopReason::GoldFloor => write!(f, "gold floor reached"),
            StopReason::TimeLimit => write!(f, "run time limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Farming,
    Enhancing,
    Stopped(StopReason),
}

impl EngineState {
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            EngineState::Stopped(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Farming => write!(f, "farming"),
            EngineState::Enhancing => write!(f, "enhancing"),
            EngineState::Stopped(reason) => write!(f, "stopped: {reason}"),
        }
    }
}

/// Chat command the engine can type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Enhance,
    Sell,
}

/// Session counter bumped by an engine effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Trash,
    Hidden,
    EnhanceOk,
    EnhanceHold,
    Destroy,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the macro.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid text pattern: {0}")]
    Pattern(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Journal error: {0}")]
    Journal(String),

    /// Restart requested; unwinds the run back to the menu.
    #[error("Restart requested")]
    Restart,

    /// User interrupt; ends the run with a summary.
    #[error("Interrupted by user")]
    Interrupted,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
