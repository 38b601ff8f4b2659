use std::panic;
use std::thread;

use divergence::{compare, Divergence, MatchResult};
use register_snapshot::{RegisterSnapshot, StepRecord};
use tracing::{debug, info};

use crate::lane::ObserveError;
use crate::{EngineConfig, EngineResult, Lane, Side};

/// Where the engine is in its run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Targets started, nothing compared yet.
    Initializing,
    /// Both targets are running to the shared breakpoint.
    Aligning,
    /// Compare-then-step loop.
    Stepping,
    /// A step compared unequal.
    Diverged,
    /// A target went away before any divergence.
    Exhausted,
    /// The step budget ran out without a divergence.
    Completed,
}

/// How a run ended, when the harness itself did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The snapshots at `step` differ.
    Diverged {
        /// Index of the diverging step.
        step: u64,
        /// Field-level comparison of that step.
        divergence: Divergence,
    },
    /// `side` could not be observed at `step`; every earlier step matched.
    Exhausted {
        /// First step that could not be observed.
        step: u64,
        /// Target that went away.
        side: Side,
        /// What the driver reported.
        reason: String,
    },
    /// `steps` steps compared equal and the budget ran out.
    Completed {
        /// Number of steps compared.
        steps: u64,
    },
}

impl RunOutcome {
    /// Whether the run found a register divergence.
    pub fn is_divergence(&self) -> bool {
        matches!(self, RunOutcome::Diverged { .. })
    }
}

/// Lockstep controller owning both lanes and the step counter.
pub struct Engine {
    subject: Lane,
    reference: Lane,
    config: EngineConfig,
    phase: Phase,
    terminated: bool,
}

impl Engine {
    /// Builds an engine over two started targets.
    pub fn new(subject: Lane, reference: Lane, config: EngineConfig) -> Self {
        Self {
            subject,
            reference,
            config,
            phase: Phase::Initializing,
            terminated: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs to completion. Both targets are terminated before returning.
    pub fn run(&mut self) -> EngineResult<RunOutcome> {
        self.run_with(|_| {})
    }

    /// Like [`Engine::run`], calling `on_step` with every step pair right
    /// before it is compared.
    pub fn run_with(&mut self, mut on_step: impl FnMut(&StepRecord)) -> EngineResult<RunOutcome> {
        let result = self.drive(&mut on_step);
        self.shutdown();
        result
    }

    /// Force-kills both targets. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.subject.terminate();
        self.reference.terminate();
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    fn drive(&mut self, on_step: &mut dyn FnMut(&StepRecord)) -> EngineResult<RunOutcome> {
        self.enter(Phase::Aligning);
        let (mut subject, mut reference) = self.align()?;

        self.enter(Phase::Stepping);
        let retries = self.config.transient_retries;
        let mut step = 0u64;
        loop {
            let record = StepRecord {
                step,
                subject,
                reference,
            };
            on_step(&record);
            if let MatchResult::Mismatch(divergence) = compare(&subject, &reference) {
                self.enter(Phase::Diverged);
                info!(step, "diverged");
                return Ok(RunOutcome::Diverged { step, divergence });
            }

            if self.config.max_steps.is_some_and(|max| step + 1 >= max) {
                self.enter(Phase::Completed);
                return Ok(RunOutcome::Completed { steps: step + 1 });
            }

            step += 1;
            debug!(step, "stepping");
            let stepped = (self.subject.step(), self.reference.step());
            let observed = match stepped {
                (Ok(()), Ok(())) => self.observe_both(retries),
                (s, r) => (
                    s.map(|()| RegisterSnapshot::default()),
                    r.map(|()| RegisterSnapshot::default()),
                ),
            };
            (subject, reference) = match observed {
                (Ok(s), Ok(r)) => (s, r),
                (Err(err), _) => return self.give_up(step, Side::Subject, err),
                (_, Err(err)) => return self.give_up(step, Side::Reference, err),
            };
        }
    }

    fn align(&mut self) -> EngineResult<(RegisterSnapshot, RegisterSnapshot)> {
        let config = &self.config;
        let (subject, reference) = (&mut self.subject, &mut self.reference);
        let (subject, reference) = thread::scope(|scope| {
            let handle = scope.spawn(|| subject.align(config));
            let reference = reference.align(config);
            (join(handle), reference)
        });
        Ok((subject?, reference?))
    }

    fn observe_both(
        &mut self,
        retries: u32,
    ) -> (
        Result<RegisterSnapshot, ObserveError>,
        Result<RegisterSnapshot, ObserveError>,
    ) {
        let (subject, reference) = (&mut self.subject, &mut self.reference);
        thread::scope(|scope| {
            let handle = scope.spawn(|| subject.observe(retries));
            let reference = reference.observe(retries);
            (join(handle), reference)
        })
    }

    fn give_up(&mut self, step: u64, side: Side, err: ObserveError) -> EngineResult<RunOutcome> {
        if err.is_exhausted() {
            let reason = err.describe();
            self.enter(Phase::Exhausted);
            info!(step, %side, %reason, "target exhausted");
            Ok(RunOutcome::Exhausted { step, side, reason })
        } else {
            Err(err.into_engine(side))
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| panic::resume_unwind(payload))
}
