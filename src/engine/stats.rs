//! Session statistics and the end-of-run summary.
//!
//! Counters only ever go up within a session. The first gold reading
//! is kept as the baseline for the session's gold delta. Every reading
//! also feeds the peak, the low and the worst drop from a running peak.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use super::cycle::{gold_delta, CycleTracker};
use crate::types::Counter;

const RULE_WIDTH: usize = 50;

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionStats {
    pub trash: u32,
    pub hidden: u32,
    pub destroyed: u32,
    pub enhance_ok: u32,
    pub enhance_hold: u32,
    gold_first: Option<u64>,
    gold_last: Option<u64>,
    gold_peak: Option<u64>,
    gold_low: Option<u64>,
    /// Largest drop from a running peak, in percent of that peak.
    max_drawdown: f64,
    started_at: Instant,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(now: Instant) -> Self {
        Self {
            trash: 0,
            hidden: 0,
            destroyed: 0,
            enhance_ok: 0,
            enhance_hold: 0,
            gold_first: None,
            gold_last: None,
            gold_peak: None,
            gold_low: None,
            max_drawdown: 0.0,
            started_at: now,
        }
    }

    pub fn bump(&mut self, counter: Counter) {
        let slot = match counter {
            Counter::Trash => &mut self.trash,
            Counter::Hidden => &mut self.hidden,
            Counter::EnhanceOk => &mut self.enhance_ok,
            Counter::EnhanceHold => &mut self.enhance_hold,
            Counter::Destroy => &mut self.destroyed,
        };
        *slot = slot.saturating_add(1);
    }

    /// Record a gold reading. The first one ever seen becomes the baseline.
    pub fn observe_gold(&mut self, gold: u64) {
        if self.gold_first.is_none() {
            self.gold_first = Some(gold);
        }
        self.gold_last = Some(gold);

        let peak = self.gold_peak.map_or(gold, |p| p.max(gold));
        self.gold_peak = Some(peak);
        self.gold_low = Some(self.gold_low.map_or(gold, |l| l.min(gold)));
        if peak > 0 {
            let drawdown = (peak - gold) as f64 / peak as f64 * 100.0;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }
    }

    pub fn gold_first(&self) -> Option<u64> {
        self.gold_first
    }

    pub fn gold_last(&self) -> Option<u64> {
        self.gold_last
    }

    pub fn gold_peak(&self) -> Option<u64> {
        self.gold_peak
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.started_at)
    }

    pub fn summary(&self, cycles: &CycleTracker) -> SessionSummary {
        self.summary_at(Instant::now(), cycles)
    }

    pub fn summary_at(&self, now: Instant, cycles: &CycleTracker) -> SessionSummary {
        let elapsed = now.saturating_duration_since(self.started_at);
        let gold_first = self.gold_first.unwrap_or(0);
        let gold_last = self.gold_last.unwrap_or(0);
        let gold_diff = gold_delta(gold_first, gold_last);
        let roi = if gold_first > 0 {
            gold_diff as f64 / gold_first as f64 * 100.0
        } else {
            0.0
        };
        let secs = elapsed.as_secs_f64();
        let gold_per_hour = if secs > 0.0 {
            (gold_diff as f64 / secs * 3600.0) as i64
        } else {
            0
        };

        SessionSummary {
            elapsed,
            trash: self.trash,
            hidden: self.hidden,
            enhance_ok: self.enhance_ok,
            enhance_hold: self.enhance_hold,
            destroyed: self.destroyed,
            gold_first,
            gold_last,
            gold_diff,
            gold_peak: self.gold_peak.unwrap_or(0),
            gold_low: self.gold_low.unwrap_or(0),
            max_drawdown: self.max_drawdown,
            roi,
            gold_per_hour,
            cycles: cycles.count(),
            avg_cycle_secs: cycles.average_seconds(),
            avg_cycle_earned: cycles.average_earned() as i64,
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub elapsed: Duration,
    pub trash: u32,
    pub hidden: u32,
    pub enhance_ok: u32,
    pub enhance_hold: u32,
    pub destroyed: u32,
    pub gold_first: u64,
    pub gold_last: u64,
    pub gold_diff: i64,
    pub gold_peak: u64,
    pub gold_low: u64,
    /// Percent of the running peak.
    pub max_drawdown: f64,
    /// Percent gain over the first reading; 0 without a baseline.
    pub roi: f64,
    pub gold_per_hour: i64,
    pub cycles: u32,
    pub avg_cycle_secs: f64,
    pub avg_cycle_earned: i64,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "─".repeat(RULE_WIDTH);
        let total = self.elapsed.as_secs();
        writeln!(f, "{rule}")?;
        writeln!(f, "  Session stats ({}m {}s)", total / 60, total % 60)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "  Trash sold:    {}", self.trash)?;
        writeln!(f, "  Hidden found:  {}", self.hidden)?;
        writeln!(f, "  Enhance ok:    {}", self.enhance_ok)?;
        writeln!(f, "  Enhance hold:  {}", self.enhance_hold)?;
        writeln!(f, "  Destroyed:     {}", self.destroyed)?;
        writeln!(
            f,
            "  Gold:          {}G → {}G ({}G)",
            group_gold(self.gold_first),
            group_gold(self.gold_last),
            signed_gold(self.gold_diff),
        )?;
        writeln!(
            f,
            "  Peak / low:    {}G / {}G (max drawdown {:.1}%)",
            group_gold(self.gold_peak),
            group_gold(self.gold_low),
            self.max_drawdown,
        )?;
        writeln!(f, "  Return:        {:+.1}%", self.roi)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "  Gold per hour: {}G/h", signed_gold(self.gold_per_hour))?;
        writeln!(
            f,
            "  Cycles done:   {} (avg {:.0}s, {}G/cycle)",
            self.cycles,
            self.avg_cycle_secs,
            signed_gold(self.avg_cycle_earned),
        )?;
        write!(f, "{rule}")
    }
}

/// `1234567` → `1,234,567`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn group_gold(value: u64) -> String {
    group_thousands(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Grouped with an explicit sign: `+1,500`, `-20`, `+0`.
pub fn signed_gold(value: i64) -> String {
    if value >= 0 {
        format!("+{}", group_thousands(value))
    } else {
        group_thousands(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
