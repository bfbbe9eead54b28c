//! Pause / restart / interrupt flags shared with an outside listener.
//!
//! The engine only looks at the flags at its suspension points: before
//! typing a command, inside the pause wait, and between the short slices
//! every engine wait is cut into. Flags are last-write-wins atomics.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::types::MacroError;

/// How often a paused or waiting engine re-checks the flags.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Flags {
    paused: AtomicBool,
    restart: AtomicBool,
    interrupt: AtomicBool,
}

/// Cheap to clone; every clone shares the same flags.
#[derive(Debug, Clone, Default)]
pub struct ControlSignal {
    flags: Arc<Flags>,
}

impl ControlSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip pause; returns the new paused state.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.flags.paused.fetch_xor(true, Ordering::SeqCst);
        info!(paused, "Pause toggled");
        paused
    }

    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn request_restart(&self) {
        if !self.flags.restart.swap(true, Ordering::SeqCst) {
            info!("Restart requested");
        }
    }

    pub fn restart_requested(&self) -> bool {
        self.flags.restart.load(Ordering::SeqCst)
    }

    pub fn interrupt(&self) {
        if !self.flags.interrupt.swap(true, Ordering::SeqCst) {
            info!("Interrupt requested");
        }
    }

    pub fn interrupted(&self) -> bool {
        self.flags.interrupt.load(Ordering::SeqCst)
    }

    /// Clear every flag before a new run.
    pub fn reset(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
        self.flags.restart.store(false, Ordering::SeqCst);
        self.flags.interrupt.store(false, Ordering::SeqCst);
    }

    /// Fail fast if a restart or interrupt is pending.
    pub fn check(&self) -> Result<(), MacroError> {
        if self.restart_requested() {
            return Err(MacroError::Restart);
        }
        if self.interrupted() {
            return Err(MacroError::Interrupted);
        }
        Ok(())
    }

    /// Suspension point: check, then hold here while paused.
    pub async fn checkpoint(&self) -> Result<(), MacroError> {
        self.check()?;
        while self.is_paused() {
            tokio::time::sleep(POLL_INTERVAL).await;
            self.check()?;
        }
        Ok(())
    }

    /// Drive `run` to completion, raising an interrupt if `stop`
    /// resolves first so the run still ends through its cleanup. The
    /// flag tells whether `stop` fired.
    pub async fn interrupt_on<F, S>(&self, run: F, stop: S) -> (F::Output, bool)
    where
        F: Future,
        S: Future,
    {
        tokio::pin!(run);
        tokio::pin!(stop);
        let mut fired = false;
        loop {
            tokio::select! {
                out = &mut run => return (out, fired),
                _ = &mut stop, if !fired => {
                    fired = true;
                    info!("Stop signal received, interrupting run");
                    self.interrupt();
                }
            }
        }
    }

    /// Sleep for `duration`, waking every [`POLL_INTERVAL`] to check for
    /// a restart or interrupt.
    pub async fn sleep(&self, duration: Duration) -> Result<(), MacroError> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Resolves when the process is asked to terminate (SIGTERM). Never
/// resolves where there is no such signal.
pub async fn terminate_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    std::future::pending::<()>().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
