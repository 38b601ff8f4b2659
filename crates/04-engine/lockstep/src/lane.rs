use std::fmt;
use std::time::Instant;

use register_snapshot::RegisterSnapshot;
use state_extract::{Extract, ExtractError, Extractor};
use target_driver::{Command, Target, TargetError};
use tracing::{debug, info, warn};

use crate::{EngineConfig, EngineError};

/// Which of the two compared targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The emulator under test.
    Subject,
    /// The implementation it is checked against.
    Reference,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Subject => "subject",
            Side::Reference => "reference",
        })
    }
}

/// One side of the comparison: a target and the extractor for its output.
pub struct Lane {
    side: Side,
    target: Box<dyn Target>,
    extractor: Extractor,
}

/// Why a lane could not produce a snapshot.
#[derive(Debug)]
pub(crate) enum ObserveError {
    Target(TargetError),
    Extract { attempts: u32, source: ExtractError },
}

impl ObserveError {
    /// The target is gone, so the run ends without a verdict.
    pub(crate) fn is_exhausted(&self) -> bool {
        match self {
            ObserveError::Target(err) => err.is_exhausted(),
            ObserveError::Extract { source, .. } => !source.is_transient(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            ObserveError::Target(err) => err.to_string(),
            ObserveError::Extract { source, .. } => source.to_string(),
        }
    }

    pub(crate) fn into_engine(self, side: Side) -> EngineError {
        match self {
            ObserveError::Target(source) => EngineError::Target { side, source },
            ObserveError::Extract { attempts, source } => EngineError::Extract {
                side,
                attempts,
                source,
            },
        }
    }
}

impl From<TargetError> for ObserveError {
    fn from(err: TargetError) -> Self {
        ObserveError::Target(err)
    }
}

impl Lane {
    /// Pairs `target` with the extractor that decodes its output.
    pub fn new(side: Side, target: Box<dyn Target>, extractor: Extractor) -> Self {
        Self {
            side,
            target,
            extractor,
        }
    }

    /// Side this lane stands for.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Driven target.
    pub fn target(&self) -> &dyn Target {
        self.target.as_ref()
    }

    pub(crate) fn step(&mut self) -> Result<(), ObserveError> {
        self.target.send(&Command::Step)?;
        Ok(())
    }

    /// Requests a register report and reads until it decodes.
    ///
    /// A truncated text dump is read again and the new output appended, up to
    /// `retries` extra reads.
    pub(crate) fn observe(&mut self, retries: u32) -> Result<RegisterSnapshot, ObserveError> {
        self.target.send(&Command::ShowRegisters)?;
        let mut buf = Vec::new();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let chunk = self.target.read_step()?;
            buf.extend_from_slice(&chunk);
            match self.extractor.extract(&buf) {
                Ok(snapshot) => {
                    debug!(side = %self.side, %snapshot, "observed");
                    return Ok(snapshot);
                }
                Err(err) if err.is_transient() && attempts <= retries => {
                    warn!(
                        side = %self.side,
                        attempts,
                        %err,
                        "partial register dump, reading again"
                    );
                }
                Err(source) => return Err(ObserveError::Extract { attempts, source }),
            }
        }
    }

    /// Runs the target to the configured breakpoint and returns its state
    /// there. Without a breakpoint the current state is taken as is.
    pub(crate) fn align(&mut self, config: &EngineConfig) -> Result<RegisterSnapshot, EngineError> {
        let side = self.side;
        let target_err = |source| EngineError::Target { side, source };
        let started = Instant::now();

        let Some(breakpoint) = config.breakpoint else {
            return self
                .observe(config.transient_retries)
                .map_err(|err| err.into_engine(side));
        };

        self.target.send(&Command::Break(breakpoint)).map_err(target_err)?;
        self.target.send(&Command::Continue).map_err(target_err)?;

        let mut last_pc = None;
        loop {
            match self.observe(config.transient_retries) {
                Ok(snapshot) if snapshot.pc == breakpoint => {
                    info!(%side, pc = format_args!("{:04x}", snapshot.pc), "aligned at breakpoint");
                    return Ok(snapshot);
                }
                Ok(snapshot) => {
                    debug!(
                        %side,
                        pc = format_args!("{:04x}", snapshot.pc),
                        "stopped short of breakpoint"
                    );
                    last_pc = Some(snapshot.pc);
                    self.target.send(&Command::Continue).map_err(target_err)?;
                }
                Err(ObserveError::Target(TargetError::Stalled { .. })) => {}
                Err(err) => return Err(err.into_engine(side)),
            }
            if started.elapsed() >= config.align_timeout {
                return Err(EngineError::Misaligned {
                    side,
                    breakpoint,
                    waited: started.elapsed(),
                    last_pc,
                });
            }
        }
    }

    pub(crate) fn terminate(&mut self) {
        if let Err(err) = self.target.terminate() {
            warn!(side = %self.side, %err, "failed to terminate target");
        }
    }
}
