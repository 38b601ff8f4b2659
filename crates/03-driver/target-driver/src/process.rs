//! Child-process driver speaking a line-oriented debugger console.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command as OsCommand, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::{Command, CommandSyntax, Target, TargetError, TargetResult};

const READ_CHUNK: usize = 32 * 1024;

/// Program and arguments used to start a target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Executable path or name.
    pub program: OsString,
    /// Arguments passed verbatim.
    pub args: Vec<OsString>,
}

impl ProcessSpec {
    /// Creates a spec with no arguments.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// How a read decides that one step's output has arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadDiscipline {
    /// Wait a fixed delay after the command, then take the first chunk and
    /// everything already queued behind it. For consoles with no completion
    /// marker.
    FixedDelay {
        /// Delay before reading.
        delay: Duration,
    },
    /// Keep receiving until the console is idle again: it printed one prompt
    /// per command sent since the last read (plus its greeting on the first
    /// read) and the buffer ends with the prompt. Output that arrives before a
    /// deadline expires is kept for the next read.
    Prompt {
        /// Prompt text, compared after trimming trailing whitespace.
        prompt: String,
    },
}

impl ReadDiscipline {
    /// Prompt-delimited reads when the syntax has a prompt, a fixed delay
    /// otherwise.
    pub fn for_syntax(syntax: &CommandSyntax, fallback_delay: Duration) -> Self {
        match &syntax.prompt {
            Some(prompt) => ReadDiscipline::Prompt {
                prompt: prompt.clone(),
            },
            None => ReadDiscipline::FixedDelay {
                delay: fallback_delay,
            },
        }
    }
}

/// Target backed by a child process's standard input and output.
pub struct ProcessTarget {
    name: String,
    syntax: CommandSyntax,
    discipline: ReadDiscipline,
    read_timeout: Duration,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    output: Receiver<Vec<u8>>,
    carry: Vec<u8>,
    prompts_owed: usize,
}

impl ProcessTarget {
    /// Spawns the process with piped stdin/stdout and starts its reader thread.
    ///
    /// `read_timeout` bounds every [`Target::read_step`]; expiry is reported as
    /// [`TargetError::Stalled`].
    pub fn spawn(
        name: impl Into<String>,
        spec: &ProcessSpec,
        syntax: CommandSyntax,
        discipline: ReadDiscipline,
        read_timeout: Duration,
    ) -> TargetResult<Self> {
        let name = name.into();
        let program = spec.program.to_string_lossy().into_owned();

        let mut cmd = OsCommand::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        kill_with_parent(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| TargetError::Spawn {
            program: program.clone(),
            source,
        })?;
        let stdin = child.stdin.take();
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(TargetError::Spawn {
                program,
                source: io::Error::new(io::ErrorKind::Other, "stdout was not piped"),
            });
        };

        // The reader thread is detached; it exits once the pipe closes.
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Err(source) = thread::Builder::new()
            .name(format!("{name}-stdout"))
            .spawn(move || pump_output(stdout, tx))
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TargetError::Spawn { program, source });
        }

        debug!(label = %name, %program, pid = child.id(), "spawned target");
        Ok(Self {
            name,
            syntax,
            discipline,
            read_timeout,
            child: Some(child),
            stdin,
            output: rx,
            carry: Vec::new(),
            // The console greets with a prompt before the first command.
            prompts_owed: 1,
        })
    }

    /// Writes one raw line to the console.
    pub fn send_line(&mut self, line: &str) -> TargetResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TargetError::Closed {
                target: self.name.clone(),
            });
        };
        debug!(label = %self.name, line, "send");
        self.prompts_owed += 1;
        stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .and_then(|()| stdin.flush())
            .map_err(|err| TargetError::io(&self.name, err))
    }

    /// OS process id, while the child is alive.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn recv(&self, deadline: Instant, started: Instant) -> TargetResult<Option<Vec<u8>>> {
        match self.output.recv_deadline(deadline) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Err(TargetError::Stalled {
                target: self.name.clone(),
                waited: started.elapsed(),
            }),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn closed(&self) -> TargetError {
        TargetError::Closed {
            target: self.name.clone(),
        }
    }
}

impl Target for ProcessTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, cmd: &Command) -> TargetResult<()> {
        let line = self.syntax.render(cmd);
        self.send_line(&line)
    }

    fn read_step(&mut self) -> TargetResult<Vec<u8>> {
        let started = Instant::now();
        match self.discipline.clone() {
            ReadDiscipline::FixedDelay { delay } => {
                thread::sleep(delay);
                let deadline = Instant::now() + self.read_timeout;
                let mut buf = self.recv(deadline, started)?.ok_or_else(|| self.closed())?;
                while let Ok(more) = self.output.try_recv() {
                    buf.extend_from_slice(&more);
                }
                Ok(buf)
            }
            ReadDiscipline::Prompt { prompt } => {
                let deadline = started + self.read_timeout;
                loop {
                    if self.prompts_owed > 0
                        && count_prompts(&self.carry, &prompt) >= self.prompts_owed
                        && ends_with_prompt(&self.carry, &prompt)
                    {
                        self.prompts_owed = 0;
                        return Ok(std::mem::take(&mut self.carry));
                    }
                    match self.recv(deadline, started) {
                        Ok(Some(chunk)) => self.carry.extend_from_slice(&chunk),
                        Ok(None) if self.carry.is_empty() => return Err(self.closed()),
                        Ok(None) => {
                            self.prompts_owed = 0;
                            return Ok(std::mem::take(&mut self.carry));
                        }
                        // Partial output stays buffered for the next read.
                        Err(err) => {
                            warn!(
                                label = %self.name,
                                buffered = self.carry.len(),
                                owed = self.prompts_owed,
                                "console not idle before deadline"
                            );
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    fn terminate(&mut self) -> TargetResult<()> {
        self.stdin = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        debug!(label = %self.name, pid = child.id(), "killing target");
        match child.kill() {
            Ok(()) => {}
            // Already exited.
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => {}
            Err(err) => return Err(TargetError::io(&self.name, err)),
        }
        child.wait().map_err(|err| TargetError::io(&self.name, err))?;
        Ok(())
    }
}

impl Drop for ProcessTarget {
    fn drop(&mut self) {
        if let Err(err) = self.terminate() {
            warn!(label = %self.name, %err, "failed to terminate target on drop");
        }
    }
}

fn pump_output(mut stdout: ChildStdout, tx: Sender<Vec<u8>>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

fn count_prompts(buf: &[u8], prompt: &str) -> usize {
    let prompt = prompt.trim_end().as_bytes();
    if prompt.is_empty() {
        return 0;
    }
    buf.windows(prompt.len()).filter(|window| *window == prompt).count()
}

fn ends_with_prompt(buf: &[u8], prompt: &str) -> bool {
    let prompt = prompt.trim_end().as_bytes();
    let end = buf
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    buf[..end].ends_with(prompt)
}

#[cfg(target_os = "linux")]
fn kill_with_parent(cmd: &mut OsCommand) {
    use std::os::unix::process::CommandExt;

    // SAFETY: `prctl` is async-signal-safe and touches no memory shared with
    // the parent, which is all `pre_exec` requires.
    unsafe {
        cmd.pre_exec(|| {
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn kill_with_parent(_cmd: &mut OsCommand) {}
