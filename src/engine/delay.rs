//! Turn delay tiers.
//!
//! Low levels rarely fail, so they are pushed through quickly; high
//! levels give the chat client time to render before the next capture.

use std::time::Duration;

use crate::config::MacroConfig;
use crate::types::Mode;

/// Levels at or below this use the boost delay.
pub const BOOST_LEVEL: u32 = 4;
pub const BOOST_DELAY: Duration = Duration::from_millis(1500);
/// Wait after selling a trash drop back before the next enhance.
pub const TRASH_DELAY: Duration = Duration::from_millis(1200);

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DelayPolicy {
    slow_start_level: u32,
    fast: Duration,
    slow: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::from_config(&MacroConfig::default())
    }
}

impl DelayPolicy {
    pub fn new(slow_start_level: u32, fast_secs: f64, slow_secs: f64) -> Self {
        Self {
            slow_start_level,
            fast: secs(fast_secs),
            slow: secs(slow_secs),
        }
    }

    pub fn from_config(cfg: &MacroConfig) -> Self {
        Self::new(cfg.slow_start_level, cfg.fast_delay, cfg.slow_delay)
    }

    /// Wait before the next enhance, given the level just read.
    ///
    /// The first enhance after a hidden pickup always gets the boost
    /// delay. The tiers are the same in every mode.
    pub fn next_delay(&self, level: u32, _mode: Mode, first_after_hidden: bool) -> Duration {
        if first_after_hidden {
            BOOST_DELAY
        } else if level >= self.slow_start_level {
            self.slow
        } else if level <= BOOST_LEVEL {
            BOOST_DELAY
        } else {
            self.fast
        }
    }

    pub fn fast(&self) -> Duration {
        self.fast
    }

    pub fn slow(&self) -> Duration {
        self.slow
    }

    pub fn boost(&self) -> Duration {
        BOOST_DELAY
    }

    pub fn trash(&self) -> Duration {
        TRASH_DELAY
    }

    pub fn slow_start_level(&self) -> u32 {
        self.slow_start_level
    }
}

/// Seconds from config; negative or non-finite values clamp to zero.
pub fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
