//! Decision engine: delay policy, cycle and session bookkeeping, the
//! pure farm/enhance state machine and the async loop that drives it.

pub mod cycle;
pub mod delay;
pub mod machine;
pub mod runner;
pub mod stats;

pub use cycle::{CycleSummary, CycleTracker};
pub use delay::DelayPolicy;
pub use machine::{Effect, Machine, Record, Transition, TurnContext};
pub use runner::{Collaborators, MacroEngine, RunOutcome, RunPlan, RunReport};
pub use stats::{SessionStats, SessionSummary};
