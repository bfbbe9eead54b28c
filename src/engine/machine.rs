//! Turn state machine.
//!
//! [`Machine::step`] is a pure function from the current state and one
//! classified capture to the next state plus a list of [`Effect`]s. The
//! runner executes the effects in order against the real collaborators;
//! nothing here touches the screen, the clock or the journal.

use std::time::Duration;

use super::delay::DelayPolicy;
use crate::types::{Command, Counter, EngineState, Mode, OcrEvent, Outcome, Reading, StopReason};

/// Consecutive undecided farming reads before backing off.
pub const UNDECIDED_BACKOFF_AFTER: u32 = 3;
/// Longest undecided backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(8);

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Event-log row requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A drop while farming; `trash` false means a hidden sword.
    Farm { trash: bool, item: String },
    Enhance {
        level: Option<u32>,
        outcome: Outcome,
    },
    Goal { level: Option<u32> },
    Sell { level: Option<u32> },
}

/// Side effect the runner performs after a transition, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Type a command, then wait.
    Send { command: Command, wait: Duration },
    /// Wait without typing anything.
    Backoff(Duration),
    Count(Counter),
    BeginCycle,
    EndCycle,
    Record(Record),
}

/// Per-run settings a transition reads.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub mode: Mode,
    /// Hidden hunting: sell at the goal and farm again instead of stopping.
    pub auto_continue: bool,
    /// Stop at or below this gold. 0 disables.
    pub min_gold: u64,
    pub delays: &'a DelayPolicy,
}

impl TurnContext<'_> {
    fn below_floor(&self, gold: Option<u64>) -> bool {
        self.min_gold > 0 && gold.is_some_and(|g| g <= self.min_gold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Machine,
    pub effects: Vec<Effect>,
    /// One-line account of the decision for the decision log.
    pub note: String,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Machine {
    pub state: EngineState,
    /// Wait after the next enhance command.
    pub delay: Duration,
    /// Consecutive undecided farming reads.
    pub undecided: u32,
}

impl Machine {
    pub fn start(mode: Mode, delays: &DelayPolicy) -> Self {
        let state = if mode.starts_farming() {
            EngineState::Farming
        } else {
            EngineState::Enhancing
        };
        Self {
            state,
            delay: delays.fast(),
            undecided: 0,
        }
    }

    /// Command that opens the next turn and the wait before capturing.
    pub fn opening(&self, delays: &DelayPolicy) -> Option<(Command, Duration)> {
        match self.state {
            EngineState::Farming => Some((Command::Sell, delays.fast())),
            EngineState::Enhancing => Some((Command::Enhance, self.delay)),
            EngineState::Stopped(_) => None,
        }
    }

    pub fn step(&self, reading: &Reading, ctx: &TurnContext<'_>) -> Transition {
        match self.state {
            EngineState::Farming => self.farm(reading, ctx),
            EngineState::Enhancing => self.enhance(reading, ctx),
            EngineState::Stopped(_) => Transition {
                next: *self,
                effects: Vec::new(),
                note: "stopped".into(),
            },
        }
    }

    fn with_state(&self, state: EngineState) -> Self {
        Self { state, ..*self }
    }

    fn stop(&self, reason: StopReason, note: impl Into<String>) -> Transition {
        Transition {
            next: self.with_state(EngineState::Stopped(reason)),
            effects: Vec::new(),
            note: note.into(),
        }
    }

    // -- Farming ------------------------------------------------------------

    fn farm(&self, reading: &Reading, ctx: &TurnContext<'_>) -> Transition {
        let settled = Self {
            undecided: 0,
            ..*self
        };
        let enhance = |wait| Effect::Send {
            command: Command::Enhance,
            wait,
        };

        if reading.event == OcrEvent::Empty {
            return Transition {
                next: settled,
                effects: vec![enhance(ctx.delays.fast())],
                note: "no reply on screen, enhance".into(),
            };
        }

        if ctx.below_floor(reading.gold) {
            return self.stop(StopReason::GoldFloor, "gold floor reached");
        }

        match &reading.event {
            OcrEvent::SaleBlocked => Transition {
                next: settled,
                effects: vec![enhance(ctx.delays.fast())],
                note: "unsellable sword, enhance".into(),
            },
            OcrEvent::ItemDropped { name, trash: true } => Transition {
                next: settled,
                effects: vec![
                    Effect::Count(Counter::Trash),
                    Effect::Record(Record::Farm {
                        trash: true,
                        item: truncate(name, 30),
                    }),
                    enhance(ctx.delays.trash()),
                ],
                note: format!("trash ({}), enhance", truncate(name, 20)),
            },
            OcrEvent::ItemDropped { name, trash: false } => Transition {
                next: Machine {
                    state: EngineState::Enhancing,
                    delay: ctx.delays.next_delay(0, ctx.mode, true),
                    undecided: 0,
                },
                effects: vec![
                    Effect::Count(Counter::Hidden),
                    Effect::Record(Record::Farm {
                        trash: false,
                        item: truncate(name, 30),
                    }),
                    Effect::BeginCycle,
                ],
                note: format!("hidden sword ({}), start enhancing", truncate(name, 30)),
            },
            _ => self.undecided_farm(ctx),
        }
    }

    fn undecided_farm(&self, ctx: &TurnContext<'_>) -> Transition {
        let undecided = self.undecided.saturating_add(1);
        let next = Self { undecided, ..*self };

        if undecided >= UNDECIDED_BACKOFF_AFTER {
            let wait = Duration::from_secs(u64::from(undecided)).min(MAX_BACKOFF);
            Transition {
                next,
                effects: vec![Effect::Backoff(wait)],
                note: format!("undecided x{undecided}, wait {}s", wait.as_secs()),
            }
        } else {
            Transition {
                next,
                effects: vec![Effect::Send {
                    command: Command::Enhance,
                    wait: ctx.delays.fast(),
                }],
                note: "undecided, enhance".into(),
            }
        }
    }

    // -- Enhancing ----------------------------------------------------------

    fn enhance(&self, reading: &Reading, ctx: &TurnContext<'_>) -> Transition {
        let stay = |delay: Duration, effects: Vec<Effect>, note: String| Transition {
            next: Machine {
                state: EngineState::Enhancing,
                delay,
                undecided: self.undecided,
            },
            effects,
            note,
        };

        match reading.event {
            OcrEvent::Empty => {
                return stay(self.delay, Vec::new(), "no reply on screen, enhance again".into())
            }
            OcrEvent::InsufficientFunds => {
                return self.stop(StopReason::InsufficientFunds, "not enough gold")
            }
            _ => {}
        }

        if ctx.below_floor(reading.gold) {
            return self.stop(StopReason::GoldFloor, "gold floor reached");
        }

        let level = reading.event.level();
        let mut effects = Vec::new();

        match reading.event.outcome() {
            Some(Outcome::Destroy) if ctx.mode.tracks_destroy() => {
                return Transition {
                    next: Machine {
                        state: EngineState::Farming,
                        delay: ctx.delays.fast(),
                        undecided: 0,
                    },
                    effects: vec![
                        Effect::Count(Counter::Destroy),
                        Effect::Record(Record::Enhance {
                            level: Some(0),
                            outcome: Outcome::Destroy,
                        }),
                        Effect::EndCycle,
                    ],
                    note: "sword destroyed, back to farming".into(),
                };
            }
            Some(outcome @ Outcome::Success) | Some(outcome @ Outcome::Hold) => {
                let counter = if outcome == Outcome::Success {
                    Counter::EnhanceOk
                } else {
                    Counter::EnhanceHold
                };
                effects.push(Effect::Count(counter));
                effects.push(Effect::Record(Record::Enhance { level, outcome }));
            }
            _ => {}
        }

        match reading.event {
            OcrEvent::GoalReached { .. } => self.goal(level, effects, ctx),
            OcrEvent::EnhanceOutcome { level: Some(l), .. } => {
                let delay = ctx.delays.next_delay(l, ctx.mode, false);
                stay(delay, effects, format!("at +{l}, next wait {:.1}s", delay.as_secs_f64()))
            }
            _ => stay(self.delay, effects, "no level on screen, enhance again".into()),
        }
    }

    fn goal(&self, level: Option<u32>, mut effects: Vec<Effect>, ctx: &TurnContext<'_>) -> Transition {
        effects.push(Effect::Record(Record::Goal { level }));

        let sell_and_farm = match ctx.mode {
            Mode::ReachLevel => false,
            Mode::HuntHidden => ctx.auto_continue,
            Mode::MineGold => true,
        };

        if !sell_and_farm {
            return Transition {
                next: self.with_state(EngineState::Stopped(StopReason::GoalReached)),
                effects,
                note: "goal reached, stopping".into(),
            };
        }

        effects.extend([
            Effect::Send {
                command: Command::Sell,
                wait: ctx.delays.fast(),
            },
            Effect::EndCycle,
            Effect::Record(Record::Sell { level }),
        ]);
        Transition {
            next: Machine {
                state: EngineState::Farming,
                delay: ctx.delays.fast(),
                undecided: 0,
            },
            effects,
            note: "goal reached, sell and farm again".into(),
        }
    }
}

/// First `max` characters of `s`.
pub fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
