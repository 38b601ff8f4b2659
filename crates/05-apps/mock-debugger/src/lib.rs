//! Scripted debugger consoles for exercising the lockstep comparator.
//!
//! A [`Console`] imitates either supported debugger dialect on top of a
//! deterministic [`Machine`]. It can be driven in-process ([`ScriptedTarget`],
//! [`ScriptedProcess`]) or as the `mock-debugger` binary over real pipes.

mod console;
mod machine;
mod scripted;

pub use console::{Console, ConsoleOptions, Override, Reply, Style, CONTINUE_LIMIT};
pub use machine::{Machine, POST_BOOT};
pub use scripted::{Probe, ScriptedProcess, ScriptedTarget};

use thiserror::Error;

/// Errors raised while configuring a mock console.
#[derive(Debug, Error)]
pub enum MockError {
    /// An override was not of the form `STEP:REG=VALUE`.
    #[error("invalid override `{0}`, expected STEP:REG=VALUE")]
    Override(String),
}
