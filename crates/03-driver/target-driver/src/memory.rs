//! Memory-observation driver: registers are copied out of another process.

use std::ffi::OsString;
use std::io;
use std::process::{Command as OsCommand, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::{Command, Target, TargetError, TargetResult};

/// Read access to a foreign address space.
pub trait ProcessMemory: Send {
    /// Fills `buf` with the bytes at `address`.
    fn read(&mut self, address: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Kills the observed process.
    fn terminate(&mut self) -> io::Result<()>;
}

/// Makes the observed process execute one instruction.
///
/// Memory targets have no console, so stepping is delegated to whatever
/// mechanism the caller has (a helper command, a human at a keyboard, ...).
pub trait Advance: Send {
    /// Advances by one instruction.
    fn step(&mut self) -> io::Result<()>;

    /// Lets the process run until its breakpoint. Defaults to doing nothing.
    fn resume(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs an external command once per step and requires it to succeed.
#[derive(Clone, Debug)]
pub struct CommandAdvance {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandAdvance {
    /// Advance through `program args...`.
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Advance for CommandAdvance {
    fn step(&mut self) -> io::Result<()> {
        let status = OsCommand::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("advance command exited with {status}"),
            ))
        }
    }
}

/// The observed process is advanced by someone else; every request is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualAdvance;

impl Advance for ManualAdvance {
    fn step(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Polling cadence for edge-triggered reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between two reads of an unchanged block.
    pub interval: Duration,
    /// Longest time a read waits for the block to change.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Target whose state is a fixed-size block at a fixed address.
///
/// `read_step` is edge-triggered: it only returns once the block differs from
/// the one returned last, so a process that did not move produces no new
/// observation. The first read always returns.
pub struct MemoryTarget {
    name: String,
    memory: Box<dyn ProcessMemory>,
    advance: Box<dyn Advance>,
    address: u64,
    block_len: usize,
    poll: PollConfig,
    last: Option<Vec<u8>>,
    terminated: bool,
}

impl MemoryTarget {
    /// Observes `block_len` bytes at `address` through `memory`.
    pub fn new(
        name: impl Into<String>,
        memory: Box<dyn ProcessMemory>,
        advance: Box<dyn Advance>,
        address: u64,
        block_len: usize,
        poll: PollConfig,
    ) -> Self {
        Self {
            name: name.into(),
            memory,
            advance,
            address,
            block_len,
            poll,
            last: None,
            terminated: false,
        }
    }

    /// Address of the observed block.
    pub fn address(&self) -> u64 {
        self.address
    }

    fn read_block(&mut self) -> TargetResult<Vec<u8>> {
        let mut buf = vec![0u8; self.block_len];
        self.memory
            .read(self.address, &mut buf)
            .map_err(|source| TargetError::MemoryRead {
                target: self.name.clone(),
                address: self.address,
                source,
            })?;
        Ok(buf)
    }

    fn advance_error(&self, source: io::Error) -> TargetError {
        TargetError::Advance {
            target: self.name.clone(),
            source,
        }
    }
}

impl Target for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, cmd: &Command) -> TargetResult<()> {
        match cmd {
            Command::Step => self.advance.step().map_err(|err| self.advance_error(err)),
            Command::Continue => self.advance.resume().map_err(|err| self.advance_error(err)),
            Command::Break(_) | Command::ShowRegisters => {
                trace!(label = %self.name, ?cmd, "ignored by memory target");
                Ok(())
            }
        }
    }

    fn read_step(&mut self) -> TargetResult<Vec<u8>> {
        let started = Instant::now();
        loop {
            let block = self.read_block()?;
            if self.last.as_deref() != Some(block.as_slice()) {
                self.last = Some(block.clone());
                return Ok(block);
            }
            if started.elapsed() >= self.poll.timeout {
                return Err(TargetError::Stalled {
                    target: self.name.clone(),
                    waited: started.elapsed(),
                });
            }
            thread::sleep(self.poll.interval);
        }
    }

    fn terminate(&mut self) -> TargetResult<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        debug!(label = %self.name, "terminating observed process");
        self.memory
            .terminate()
            .map_err(|err| TargetError::io(&self.name, err))
    }
}

impl Drop for MemoryTarget {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            warn!(label = %self.name, %err, "failed to terminate observed process on drop");
        }
    }
}
