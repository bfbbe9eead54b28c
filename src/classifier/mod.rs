//! Text classifier: raw OCR text → structured chat event.
//!
//! Everything that scrapes game text lives here. The classifier is pure
//! and total: every input, including empty or garbled text, yields
//! exactly one [`OcrEvent`]. The gold balance is parsed on every call,
//! whichever event fires.

pub mod vocabulary;

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Command, MacroError, OcrEvent, Outcome, Reading};
use vocabulary::Vocabulary;

static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\+(\d+)\]").expect("level pattern is valid"));

/// Lines of the drop message kept as the sword name.
const ITEM_NAME_LINES: usize = 3;

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

/// Target enhancement level and its on-screen marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub level: u32,
    /// Literal text matched before any numeric comparison, e.g. `[+10]`.
    pub marker: String,
}

impl Goal {
    pub fn level(level: u32) -> Self {
        Self {
            level,
            marker: format!("[+{level}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Which stage the text was captured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Farming,
    Enhancing,
}

pub struct TextClassifier {
    vocab: Vocabulary,
    goal: Goal,
    gold_re: Regex,
}

impl TextClassifier {
    pub fn new(vocab: Vocabulary, goal: Goal) -> Result<Self, MacroError> {
        let gold_re = Regex::new(&vocab.gold_pattern)
            .map_err(|e| MacroError::Pattern(format!("gold pattern: {e}")))?;
        if gold_re.captures_len() < 2 {
            return Err(MacroError::Pattern(
                "gold pattern needs a capture group".into(),
            ));
        }
        Ok(Self {
            vocab,
            goal,
            gold_re,
        })
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Chat text typed for `command`.
    pub fn command_text(&self, command: Command) -> &str {
        match command {
            Command::Enhance => &self.vocab.enhance_command,
            Command::Sell => &self.vocab.sell_command,
        }
    }

    pub fn is_trash(&self, name: &str) -> bool {
        self.vocab.is_trash(name)
    }

    /// Classify text captured after a farming command.
    pub fn classify(&self, text: &str) -> Reading {
        self.read(text, Stage::Farming)
    }

    /// Classify text captured after an enhance command.
    ///
    /// Sale and drop messages on screen at that point belong to the
    /// farming turn that preceded the enhancement, so they are skipped.
    pub fn classify_enhancing(&self, text: &str) -> Reading {
        self.read(text, Stage::Enhancing)
    }

    fn read(&self, text: &str, stage: Stage) -> Reading {
        if text.trim().is_empty() {
            return Reading::new(OcrEvent::Empty);
        }
        Reading {
            gold: self.parse_gold(text),
            event: self.event(text, stage),
        }
    }

    fn event(&self, text: &str, stage: Stage) -> OcrEvent {
        if stage == Stage::Farming {
            if self.vocab.sale_blocked.iter().any(|m| text.contains(m.as_str())) {
                return OcrEvent::SaleBlocked;
            }
            if let Some(name) = self.item_name(text) {
                let trash = self.is_trash(&name);
                return OcrEvent::ItemDropped { name, trash };
            }
        }

        if text.contains(self.vocab.insufficient_funds.as_str()) {
            return OcrEvent::InsufficientFunds;
        }

        let level = parse_level(text);
        let outcome = self.outcome(text);

        if text.contains(self.goal.marker.as_str()) {
            return OcrEvent::GoalReached { level, outcome };
        }

        match level {
            Some(l) if l >= self.goal.level => OcrEvent::GoalReached { level, outcome },
            Some(_) => OcrEvent::EnhanceOutcome { level, outcome },
            // a destroy must not be lost to a missing level marker
            None if outcome == Some(Outcome::Destroy) => OcrEvent::EnhanceOutcome {
                level: None,
                outcome,
            },
            None => OcrEvent::Undecided,
        }
    }

    /// Latest gold balance on the page. Values past `i64::MAX` are
    /// unreadable, so gold differences always fit a signed delta.
    pub fn parse_gold(&self, text: &str) -> Option<u64> {
        let raw = self
            .gold_re
            .captures_iter(text)
            .last()?
            .get(1)?
            .as_str()
            .replace(',', "");
        let gold: i64 = raw.parse().ok()?;
        u64::try_from(gold).ok()
    }

    /// Destroy outranks success, which outranks hold.
    fn outcome(&self, text: &str) -> Option<Outcome> {
        if text.contains(self.vocab.destroy.as_str()) {
            Some(Outcome::Destroy)
        } else if text.contains(self.vocab.success.as_str()) {
            Some(Outcome::Success)
        } else if text.contains(self.vocab.hold.as_str()) {
            Some(Outcome::Hold)
        } else {
            None
        }
    }

    fn item_name(&self, text: &str) -> Option<String> {
        let (_, tail) = text.rsplit_once(self.vocab.item_marker.as_str())?;
        let name = tail
            .trim()
            .lines()
            .take(ITEM_NAME_LINES)
            .collect::<Vec<_>>()
            .join(" ");
        Some(name.trim().to_string())
    }
}

/// Latest `[+N]` marker on the page.
pub fn parse_level(text: &str) -> Option<u32> {
    LEVEL_RE
        .captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
