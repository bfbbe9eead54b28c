//! Sword-growth chat game macro.
//!
//! Library crate exposing the decision engine and its collaborators for
//! the binary entry point and the integration tests.

pub mod classifier;
pub mod config;
pub mod control;
pub mod engine;
pub mod journal;
pub mod platform;
pub mod types;
