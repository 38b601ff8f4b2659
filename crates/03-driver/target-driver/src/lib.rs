#![deny(missing_docs)]
//! Drivers for the execution targets compared in lockstep.
//!
//! A [`Target`] accepts typed [`Command`]s and hands back whatever raw output
//! one step produced. Two drivers ship here:
//! * [`ProcessTarget`] – a child process with a line-oriented debugger console
//!   on its standard input/output. A dedicated reader thread owns the output
//!   pipe and forwards chunks over a channel, so reads are true blocking waits
//!   with a deadline rather than sleeps.
//! * [`MemoryTarget`] – an already running process whose registers are copied
//!   straight out of its address space, stepped through an injected
//!   [`Advance`] capability and observed with edge-triggered polling.

mod command;
mod error;
#[cfg(target_os = "linux")]
mod linux;
mod memory;
mod process;

pub use command::{Command, CommandSyntax};
pub use error::{TargetError, TargetResult};
#[cfg(target_os = "linux")]
pub use linux::{resolve_base, LinuxProcess};
pub use memory::{Advance, CommandAdvance, ManualAdvance, MemoryTarget, PollConfig, ProcessMemory};
pub use process::{ProcessSpec, ProcessTarget, ReadDiscipline};

/// One execution target driven by the comparator.
///
/// Implementations hold their channel (pipe or memory handle) open for their
/// whole lifetime and release it exactly once, on [`Target::terminate`] or on
/// drop, whichever comes first.
pub trait Target: Send {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    /// Issues a command. Never waits for the target's reply.
    fn send(&mut self, cmd: &Command) -> TargetResult<()>;

    /// Blocks until the target produced output for the current step and
    /// returns it verbatim. No framing is imposed on the bytes.
    fn read_step(&mut self) -> TargetResult<Vec<u8>>;

    /// Forcibly stops the target. Calling it again is a no-op.
    fn terminate(&mut self) -> TargetResult<()>;
}

impl<T: Target + ?Sized> Target for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&mut self, cmd: &Command) -> TargetResult<()> {
        (**self).send(cmd)
    }

    fn read_step(&mut self) -> TargetResult<Vec<u8>> {
        (**self).read_step()
    }

    fn terminate(&mut self) -> TargetResult<()> {
        (**self).terminate()
    }
}
