//! In-process targets backed by the mock console and machine.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use state_extract::pack;
use target_driver::{
    Advance, Command, CommandSyntax, ProcessMemory, Target, TargetError, TargetResult,
};

use crate::{Console, ConsoleOptions, Machine};

/// Shared record of what every scripted target was asked to do.
#[derive(Clone, Debug, Default)]
pub struct Probe {
    inner: Arc<Mutex<ProbeState>>,
}

#[derive(Debug, Default)]
struct ProbeState {
    commands: Vec<(String, Command)>,
    terminated: Vec<String>,
}

impl Probe {
    /// Every command, tagged with the target name, in issue order.
    pub fn commands(&self) -> Vec<(String, Command)> {
        self.inner.lock().commands.clone()
    }

    /// Whether the named target has been terminated.
    pub fn terminated(&self, name: &str) -> bool {
        self.inner.lock().terminated.iter().any(|t| t == name)
    }

    fn record(&self, name: &str, cmd: Command) {
        self.inner.lock().commands.push((name.to_string(), cmd));
    }

    fn kill(&self, name: &str) {
        self.inner.lock().terminated.push(name.to_string());
    }
}

/// A [`Console`] driven through its textual protocol without a process.
///
/// Commands are rendered with the console's [`CommandSyntax`] and fed to the
/// console line by line, and replies queue up until the next read, prompts
/// included, exactly as they would on a pipe.
pub struct ScriptedTarget {
    name: String,
    syntax: CommandSyntax,
    console: Console,
    output: Vec<u8>,
    exited: bool,
    probe: Probe,
}

impl ScriptedTarget {
    /// Starts a console; its greeting prompt is already queued.
    pub fn new(name: impl Into<String>, options: ConsoleOptions, probe: Probe) -> Self {
        let console = Console::new(options);
        let syntax = console.style().syntax();
        let output = console.style().prompt().as_bytes().to_vec();
        Self {
            name: name.into(),
            syntax,
            console,
            output,
            exited: false,
            probe,
        }
    }

    /// Syntax used to render commands.
    pub fn syntax(&self) -> &CommandSyntax {
        &self.syntax
    }
}

impl Target for ScriptedTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, cmd: &Command) -> TargetResult<()> {
        self.probe.record(&self.name, *cmd);
        if self.exited {
            return Err(TargetError::Closed {
                target: self.name.clone(),
            });
        }
        let reply = self.console.handle(&self.syntax.render(cmd));
        self.output.extend_from_slice(reply.output.as_bytes());
        if reply.exit {
            self.exited = true;
        } else {
            self.output
                .extend_from_slice(self.console.style().prompt().as_bytes());
        }
        Ok(())
    }

    fn read_step(&mut self) -> TargetResult<Vec<u8>> {
        if !self.output.is_empty() {
            return Ok(std::mem::take(&mut self.output));
        }
        if self.exited {
            Err(TargetError::Closed {
                target: self.name.clone(),
            })
        } else {
            Err(TargetError::Stalled {
                target: self.name.clone(),
                waited: Duration::ZERO,
            })
        }
    }

    fn terminate(&mut self) -> TargetResult<()> {
        if !self.exited {
            self.exited = true;
            self.probe.kill(&self.name);
        }
        Ok(())
    }
}

/// A running [`Machine`] observed through its memory, like an emulator whose
/// register block is read out of its address space.
///
/// A step request is only carried out after `lag` further memory reads, so a
/// poller sees the old block a few times before the new one shows up.
#[derive(Clone, Debug)]
pub struct ScriptedProcess {
    inner: Arc<Mutex<ProcessState>>,
}

#[derive(Debug)]
struct ProcessState {
    machine: Machine,
    lag: u32,
    queued: u32,
    delay: u32,
    reads: u64,
    killed: bool,
}

impl ScriptedProcess {
    /// Wraps `machine`, delaying each step by `lag` reads.
    pub fn new(machine: Machine, lag: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProcessState {
                machine,
                lag,
                queued: 0,
                delay: 0,
                reads: 0,
                killed: false,
            })),
        }
    }

    /// Memory reads served so far.
    pub fn reads(&self) -> u64 {
        self.inner.lock().reads
    }

    /// Whether the process was killed.
    pub fn killed(&self) -> bool {
        self.inner.lock().killed
    }
}

impl ProcessMemory for ScriptedProcess {
    fn read(&mut self, _address: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut state = self.inner.lock();
        if state.killed {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such process"));
        }
        state.reads += 1;
        if state.queued > 0 {
            if state.delay > 0 {
                state.delay -= 1;
            } else {
                state.machine.step();
                state.queued -= 1;
                state.delay = state.lag;
            }
        }
        let block = pack(&state.machine.registers());
        if buf.len() < block.len() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        buf[..block.len()].copy_from_slice(&block);
        buf[block.len()..].fill(0);
        Ok(())
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.inner.lock().killed = true;
        Ok(())
    }
}

impl Advance for ScriptedProcess {
    fn step(&mut self) -> io::Result<()> {
        let mut state = self.inner.lock();
        if state.queued == 0 {
            state.delay = state.lag;
        }
        state.queued += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Style;
    use pretty_assertions::assert_eq;

    #[test]
    fn scripted_target_speaks_the_console_protocol() {
        let probe = Probe::default();
        let options = ConsoleOptions::new(Style::Gddb);
        let mut target = ScriptedTarget::new("subject", options, probe.clone());
        target.send(&Command::ShowRegisters).expect("send");
        let out = String::from_utf8(target.read_step().expect("read")).expect("utf8");
        assert!(out.starts_with("gddb> AF = 0x01b0\n"), "{out}");
        assert!(out.ends_with("gddb> "));
        assert!(matches!(target.read_step(), Err(TargetError::Stalled { .. })));

        target.terminate().expect("terminate");
        assert!(probe.terminated("subject"));
        assert!(target.send(&Command::Step).is_err());
        assert_eq!(
            probe.commands(),
            vec![
                ("subject".to_string(), Command::ShowRegisters),
                ("subject".to_string(), Command::Step),
            ]
        );
    }

    #[test]
    fn memory_lags_behind_step_requests() {
        let mut process = ScriptedProcess::new(Machine::new(5, 0, 0x0100), 2);
        let mut buf = [0u8; 14];
        process.read(0, &mut buf).expect("read");
        let before = buf;

        Advance::step(&mut process).expect("step");
        process.read(0, &mut buf).expect("read");
        process.read(0, &mut buf).expect("read");
        assert_eq!(buf, before);
        process.read(0, &mut buf).expect("read");
        assert_ne!(buf, before);
        assert_eq!(&buf[12..], &[0, 0]);
        assert_eq!(process.reads(), 4);

        ProcessMemory::terminate(&mut process).expect("kill");
        assert!(process.killed());
        assert!(process.read(0, &mut buf).is_err());
    }
}
