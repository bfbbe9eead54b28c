//! Macro engine: the async turn loop.
//!
//! One turn is strictly sequential: type a command, wait, capture, read,
//! classify, step the state machine, then carry out its effects. The
//! loop runs until the machine stops or the control signal unwinds it.
//! Every exit path ends in the same cleanup: overlay hidden, journal
//! closed, exactly once.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cycle::{CycleSummary, CycleTracker};
use super::delay::DelayPolicy;
use super::machine::{Effect, Machine, Record, TurnContext};
use super::stats::{signed_gold, group_thousands, SessionStats, SessionSummary};
use crate::classifier::{Goal, TextClassifier};
use crate::config::MacroConfig;
use crate::control::ControlSignal;
use crate::journal::{EventKind, EventResult, EventRow, Journal};
use crate::platform::{Capture, Input, Layout, Overlay, Point, Recognizer};
use crate::types::{Command, EngineState, MacroError, Mode, Outcome, StopReason};

// ---------------------------------------------------------------------------
// Run inputs and outputs
// ---------------------------------------------------------------------------

/// The collaborators one engine drives, chosen once at startup.
pub struct Collaborators {
    pub capture: Box<dyn Capture>,
    pub recognizer: Box<dyn Recognizer>,
    pub input: Box<dyn Input>,
    pub overlay: Box<dyn Overlay>,
}

/// What the menu asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub mode: Mode,
    pub target: u32,
    /// Hidden hunting only: sell at the goal and keep going.
    pub auto_continue: bool,
    /// Message box position the layout is derived from.
    pub anchor: Point,
}

impl RunPlan {
    pub fn reach_level(target: u32, anchor: Point) -> Self {
        Self {
            mode: Mode::ReachLevel,
            target,
            auto_continue: false,
            anchor,
        }
    }

    pub fn hunt_hidden(target: u32, auto_continue: bool, anchor: Point) -> Self {
        Self {
            mode: Mode::HuntHidden,
            target,
            auto_continue,
            anchor,
        }
    }

    /// Gold mining sells at the configured level and never stops on goal.
    pub fn mine_gold(cfg: &MacroConfig, anchor: Point) -> Self {
        Self {
            mode: Mode::MineGold,
            target: cfg.gold_mine_target,
            auto_continue: true,
            anchor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Stopped(StopReason),
    /// Restart requested; the caller returns to the menu.
    Restarted,
    /// User interrupt.
    Interrupted,
    /// The run hit an error it could not retry.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub summary: SessionSummary,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything owned by a single run; dropped when the run ends.
struct Session {
    plan: RunPlan,
    layout: Layout,
    classifier: TextClassifier,
    machine: Machine,
    stats: SessionStats,
    cycles: CycleTracker,
}

impl Session {
    fn row(&self, event: EventKind) -> EventRow {
        let mut row = EventRow::new(event);
        row.gold = self.stats.gold_last();
        row.mode = Some(self.plan.mode);
        row.cycle_id = self.cycles.current_id();
        row
    }

    fn row_for(&self, record: Record) -> EventRow {
        match record {
            Record::Farm { trash, item } => {
                let mut row = self.row(EventKind::Farm);
                row.level = Some(0);
                row.result = Some(if trash {
                    EventResult::Trash
                } else {
                    EventResult::Hidden
                });
                row.item = Some(item);
                row
            }
            Record::Enhance { level, outcome } => {
                let mut row = self.row(EventKind::Enhance);
                row.level = level;
                row.result = Some(match outcome {
                    Outcome::Success => EventResult::Success,
                    Outcome::Hold => EventResult::Hold,
                    Outcome::Destroy => EventResult::Destroy,
                });
                row
            }
            Record::Goal { level } => {
                let mut row = self.row(EventKind::Goal);
                row.level = level;
                row.result = Some(EventResult::Reached);
                row
            }
            Record::Sell { level } => {
                let mut row = self.row(EventKind::Sell);
                row.level = level;
                row
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct MacroEngine {
    cfg: MacroConfig,
    delays: DelayPolicy,
    io: Collaborators,
    journal: Journal,
    control: ControlSignal,
    /// Set while a run holds the overlay and journal.
    active: bool,
}

impl MacroEngine {
    pub fn new(
        cfg: MacroConfig,
        io: Collaborators,
        journal: Journal,
        control: ControlSignal,
    ) -> Self {
        Self {
            delays: DelayPolicy::from_config(&cfg),
            cfg,
            io,
            journal,
            control,
            active: false,
        }
    }

    pub fn config(&self) -> &MacroConfig {
        &self.cfg
    }

    pub fn control(&self) -> &ControlSignal {
        &self.control
    }

    /// Run until the machine stops, a restart or interrupt is raised, or
    /// an unrecoverable error occurs. Never panics on those paths; the
    /// outcome says which one happened.
    pub async fn run(&mut self, plan: &RunPlan) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, mode = plan.mode.as_str(), target = plan.target);
        self.run_inner(plan, run_id).instrument(span).await
    }

    async fn run_inner(&mut self, plan: &RunPlan, run_id: Uuid) -> RunReport {
        self.control.reset();
        self.active = true;

        let now = Instant::now();
        let mut session = match TextClassifier::new(
            self.cfg.locale.vocabulary(),
            Goal::level(plan.target),
        ) {
            Ok(classifier) => Session {
                plan: plan.clone(),
                layout: Layout::resolve(&self.cfg, plan.anchor),
                classifier,
                machine: Machine::start(plan.mode, &self.delays),
                stats: SessionStats::started_at(now),
                cycles: CycleTracker::new(),
            },
            Err(e) => {
                error!(error = %e, "Cannot build classifier");
                self.cleanup();
                return RunReport {
                    run_id,
                    outcome: RunOutcome::Failed(e.to_string()),
                    summary: SessionStats::started_at(now).summary(&CycleTracker::new()),
                };
            }
        };

        info!(
            mode = %plan.mode,
            target = plan.target,
            auto_continue = plan.auto_continue,
            "Run starting"
        );

        let result = self.drive(&mut session).await;
        let outcome = match result {
            Ok(reason) => RunOutcome::Stopped(reason),
            Err(MacroError::Restart) => RunOutcome::Restarted,
            Err(MacroError::Interrupted) => RunOutcome::Interrupted,
            Err(e) => {
                error!(error = %e, "Run failed");
                RunOutcome::Failed(e.to_string())
            }
        };

        let summary = session.stats.summary(&session.cycles);
        self.finish(&session, &outcome, &summary);

        RunReport {
            run_id,
            outcome,
            summary,
        }
    }

    async fn drive(&mut self, s: &mut Session) -> Result<StopReason, MacroError> {
        self.io.recognizer.init().await?;
        self.io.overlay.show_at(s.layout.click);
        self.note(&format!("OCR capture area: {}", s.layout.capture));
        self.note(&format!(
            "macro started: {} to +{} (click {})",
            s.plan.mode, s.plan.target, s.layout.click
        ));

        loop {
            if let Some(reason) = self.turn(s).await? {
                return Ok(reason);
            }
        }
    }

    fn time_limit(&self) -> Option<Duration> {
        self.cfg
            .max_run_minutes
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
    }

    /// One full turn. `Some` once the run has stopped.
    async fn turn(&mut self, s: &mut Session) -> Result<Option<StopReason>, MacroError> {
        self.control.checkpoint().await?;

        if let Some(reason) = s.machine.state.stop_reason() {
            return Ok(Some(reason));
        }
        if let Some(limit) = self.time_limit() {
            if s.stats.elapsed() >= limit {
                self.note("run time limit reached");
                return Ok(Some(StopReason::TimeLimit));
            }
        }

        let stage = s.machine.state;
        let Some((command, wait)) = s.machine.opening(&self.delays) else {
            return Ok(None);
        };

        self.note(&format!(
            "── {stage}: send {} ──",
            s.classifier.command_text(command)
        ));
        self.send(s, command).await?;
        self.control.sleep(wait).await?;

        let text = self.read_chat(s).await?;
        let reading = if stage == EngineState::Farming {
            s.classifier.classify(&text)
        } else {
            s.classifier.classify_enhancing(&text)
        };
        if let Some(gold) = reading.gold {
            s.stats.observe_gold(gold);
        }

        let transition = {
            let ctx = TurnContext {
                mode: s.plan.mode,
                auto_continue: s.plan.auto_continue,
                min_gold: self.cfg.min_gold,
                delays: &self.delays,
            };
            s.machine.step(&reading, &ctx)
        };

        debug!(
            event = %reading.event,
            gold = ?reading.gold,
            next = %transition.next.state,
            effects = transition.effects.len(),
            "Turn classified"
        );
        self.note(&format!("decision: {}", transition.note));

        for effect in transition.effects {
            self.apply(s, effect).await?;
        }
        s.machine = transition.next;

        let stopped = s.machine.state.stop_reason();
        if let Some(reason) = stopped {
            info!(%reason, "Run stopped");
        }
        Ok(stopped)
    }

    async fn apply(&mut self, s: &mut Session, effect: Effect) -> Result<(), MacroError> {
        match effect {
            Effect::Send { command, wait } => {
                self.send(s, command).await?;
                self.control.sleep(wait).await?;
            }
            Effect::Backoff(wait) => self.control.sleep(wait).await?,
            Effect::Count(counter) => s.stats.bump(counter),
            Effect::BeginCycle => {
                let id = s.cycles.begin(s.stats.gold_last());
                debug!(cycle = id, baseline = ?s.stats.gold_last(), "Cycle opened");
            }
            Effect::EndCycle => {
                if let Some(summary) = s.cycles.end(s.stats.gold_last()) {
                    self.cycle_closed(s, &summary);
                }
            }
            Effect::Record(record) => {
                let row = s.row_for(record);
                self.journal.record(&row);
            }
        }
        Ok(())
    }

    /// Type a command. Holds while paused. A skipped turn or a desktop
    /// hiccup is logged and the loop carries on; only restart and
    /// interrupt propagate.
    async fn send(&mut self, s: &Session, command: Command) -> Result<(), MacroError> {
        self.control.checkpoint().await?;
        let text = s.classifier.command_text(command);
        match self.io.input.send_command(text, s.layout.click).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.note("input failed - turn skipped");
                Ok(())
            }
            Err(e @ (MacroError::Restart | MacroError::Interrupted)) => Err(e),
            Err(e) => {
                warn!(error = %e, command = text, "Input error, turn skipped");
                self.note("input failed - turn skipped");
                Ok(())
            }
        }
    }

    /// Capture and recognize, holding while paused. Capture or
    /// recognizer trouble reads as an empty screen.
    async fn read_chat(&mut self, s: &Session) -> Result<String, MacroError> {
        self.control.checkpoint().await?;

        let frame = match self.io.capture.capture_region(s.layout.capture).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Capture failed");
                None
            }
        };
        let raw = match frame {
            Some(frame) => match self.io.recognizer.recognize_text(&frame).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Recognizer failed");
                    String::new()
                }
            },
            None => String::new(),
        };

        self.journal.ocr(&raw);
        Ok(raw)
    }

    fn cycle_closed(&mut self, s: &Session, c: &CycleSummary) {
        let mut row = s.row(EventKind::CycleEnd);
        row.cycle_id = c.id;
        row.cycle_secs = Some(c.elapsed.as_secs_f64());
        row.gold_earned = Some(c.earned);
        self.journal.record(&row);

        info!(
            cycle = c.id,
            secs = format!("{:.0}", c.elapsed.as_secs_f64()),
            earned = c.earned,
            gold_per_hour = c.gold_per_hour,
            "Cycle closed"
        );
        self.note(&format!(
            "cycle #{} done: {:.0}s, {}G | avg {:.0}s/{}G | {}G/h",
            c.id,
            c.elapsed.as_secs_f64(),
            signed_gold(c.earned),
            c.avg_seconds,
            signed_gold(c.avg_earned.round() as i64),
            group_thousands(c.gold_per_hour),
        ));
    }

    fn note(&mut self, msg: &str) {
        info!("{msg}");
        self.journal.note(msg);
    }

    fn finish(&mut self, s: &Session, outcome: &RunOutcome, summary: &SessionSummary) {
        match outcome {
            RunOutcome::Restarted => self.note("restarting..."),
            RunOutcome::Stopped(reason) => {
                self.note(&format!("stopped: {reason}"));
                self.journal.summary(&summary.to_string());
            }
            RunOutcome::Interrupted => {
                self.note("stopped by user");
                self.journal.summary(&summary.to_string());
            }
            RunOutcome::Failed(e) => {
                self.note(&format!("error: {e}"));
                self.journal.summary(&summary.to_string());
            }
        }

        info!(
            outcome = ?outcome,
            cycles = summary.cycles,
            gold_diff = summary.gold_diff,
            state = %s.machine.state,
            "Run finished"
        );
        self.cleanup();
    }

    /// Hide the overlay and close the journal. Runs once per run no
    /// matter how many exit paths reach it.
    fn cleanup(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.io.overlay.hide();
        self.journal.close();
    }
}

impl Drop for MacroEngine {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
