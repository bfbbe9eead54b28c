//! Cycle tracker: farm → enhance → (sell | destroy) throughput.
//!
//! At most one cycle is open at a time. Closing folds the cycle into
//! running sums that give the average cycle time, average earnings and
//! the implied gold per hour.

use std::time::Duration;
use tokio::time::Instant;

/// `to - from` in signed gold, saturating at the `i64` bounds.
pub fn gold_delta(from: u64, to: u64) -> i64 {
    let from = i64::try_from(from).unwrap_or(i64::MAX);
    let to = i64::try_from(to).unwrap_or(i64::MAX);
    to.saturating_sub(from)
}

#[derive(Debug, Clone, Copy)]
struct OpenCycle {
    started: Instant,
    baseline_gold: u64,
}

/// Result of closing a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub id: u32,
    pub elapsed: Duration,
    /// Gold at close minus gold at open. Negative when a cycle lost money.
    pub earned: i64,
    pub avg_seconds: f64,
    pub avg_earned: f64,
    pub gold_per_hour: i64,
}

#[derive(Debug, Default)]
pub struct CycleTracker {
    last_id: u32,
    open: Option<OpenCycle>,
    count: u32,
    gold_sum: i64,
    seconds_sum: f64,
}

impl CycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cycle with `last_gold` as the baseline (0 when unknown).
    /// An already open cycle is restarted.
    pub fn begin(&mut self, last_gold: Option<u64>) -> u32 {
        self.begin_at(Instant::now(), last_gold)
    }

    pub fn begin_at(&mut self, now: Instant, last_gold: Option<u64>) -> u32 {
        self.last_id += 1;
        self.open = Some(OpenCycle {
            started: now,
            baseline_gold: last_gold.unwrap_or(0),
        });
        self.last_id
    }

    /// Close the open cycle. No-op returning `None` when none is open.
    pub fn end(&mut self, last_gold: Option<u64>) -> Option<CycleSummary> {
        self.end_at(Instant::now(), last_gold)
    }

    pub fn end_at(&mut self, now: Instant, last_gold: Option<u64>) -> Option<CycleSummary> {
        let open = self.open.take()?;
        let elapsed = now.saturating_duration_since(open.started);
        let earned = gold_delta(open.baseline_gold, last_gold.unwrap_or(0));

        self.count += 1;
        self.gold_sum = self.gold_sum.saturating_add(earned);
        self.seconds_sum += elapsed.as_secs_f64();

        Some(CycleSummary {
            id: self.last_id,
            elapsed,
            earned,
            avg_seconds: self.average_seconds(),
            avg_earned: self.average_earned(),
            gold_per_hour: self.gold_per_hour(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Id of the latest opened cycle; 0 before the first one.
    pub fn current_id(&self) -> u32 {
        self.last_id
    }

    /// Closed cycles.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn average_seconds(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.seconds_sum / f64::from(self.count)
        }
    }

    pub fn average_earned(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.gold_sum as f64 / f64::from(self.count)
        }
    }

    /// `gold_sum / seconds_sum * 3600`, 0 when no time has been summed.
    pub fn gold_per_hour(&self) -> i64 {
        if self.seconds_sum > 0.0 {
            (self.gold_sum as f64 / self.seconds_sum * 3600.0) as i64
        } else {
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
