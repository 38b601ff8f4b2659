#![deny(missing_docs)]
//! Lockstep synchronization of a subject emulator against a reference.
//!
//! The [`Engine`] owns one [`Lane`] per side. Each lane pairs a
//! [`target_driver::Target`] with the [`state_extract::Extractor`] that
//! understands its output. A run goes through
//! `Initializing → Aligning → Stepping` and ends `Diverged`, `Exhausted` or,
//! when a step budget is configured, `Completed`.
//!
//! While stepping, every iteration compares the two step-N snapshots before
//! either target is told to execute instruction N+1, so snapshots from
//! different step indices are never compared. Both lanes are observed on their
//! own thread, and the engine's thread does all extraction bookkeeping and
//! comparison. Whatever the outcome, both targets are terminated before
//! [`Engine::run`] returns.

mod config;
mod engine;
mod error;
mod lane;

pub use config::EngineConfig;
pub use engine::{Engine, Phase, RunOutcome};
pub use error::{EngineError, EngineResult};
pub use lane::{Lane, Side};
