//! Text-console scenarios: a `(gameboy)` subject against a `gddb` reference.

use std::time::Duration;

use anyhow::{bail, Result};
use lockstep::{Engine, EngineConfig, EngineError, Lane, Phase, RunOutcome, Side};
use mock_debugger::{ConsoleOptions, Override, Probe, ScriptedTarget, Style};
use pretty_assertions::assert_eq;
use register_snapshot::Reg16;
use target_driver::{Command, Target, TargetError, TargetResult};

const ENTRY: u16 = 0x0100;

fn options(style: Style, seed: u64, boot_steps: u32) -> ConsoleOptions {
    ConsoleOptions {
        seed,
        boot_steps,
        ..ConsoleOptions::new(style)
    }
}

fn lane(side: Side, options: ConsoleOptions, probe: &Probe) -> Lane {
    let name = side.to_string();
    let target = ScriptedTarget::new(name, options, probe.clone());
    let extractor = target.syntax().extractor();
    Lane::new(side, Box::new(target), extractor)
}

fn engine(
    subject: ConsoleOptions,
    reference: ConsoleOptions,
    max_steps: Option<u64>,
) -> (Engine, Probe) {
    let probe = Probe::default();
    let engine = Engine::new(
        lane(Side::Subject, subject, &probe),
        lane(Side::Reference, reference, &probe),
        EngineConfig {
            breakpoint: Some(ENTRY),
            max_steps,
            ..EngineConfig::default()
        },
    );
    (engine, probe)
}

fn steps_sent(probe: &Probe, name: &str) -> usize {
    probe
        .commands()
        .iter()
        .filter(|(target, cmd)| target == name && *cmd == Command::Step)
        .count()
}

#[test]
fn identical_trajectories_run_a_thousand_steps() -> Result<()> {
    let (mut engine, probe) = engine(
        options(Style::Gameboy, 77, 256),
        options(Style::Gddb, 77, 1024),
        Some(1000),
    );
    let mut compared = 0u64;
    let outcome = engine.run_with(|record| {
        assert_eq!(record.step, compared);
        compared += 1;
    })?;
    assert_eq!(outcome, RunOutcome::Completed { steps: 1000 });
    assert_eq!(compared, 1000);
    assert!(probe.terminated("subject"));
    assert!(probe.terminated("reference"));
    Ok(())
}

#[test]
fn pc_divergence_halts_at_step_five() -> Result<()> {
    let mut subject = options(Style::Gameboy, 5, 20);
    subject.overrides.push("5:PC=0x0213".parse::<Override>()?);
    let mut reference = options(Style::Gddb, 5, 90);
    reference.overrides.push("5:PC=0x0214".parse::<Override>()?);

    let (mut engine, probe) = engine(subject, reference, None);
    let RunOutcome::Diverged { step, divergence } = engine.run()? else {
        bail!("expected a divergence");
    };
    assert_eq!(step, 5);
    assert_eq!(engine.phase(), Phase::Diverged);
    assert_eq!(
        divergence.mismatched().map(|f| f.reg).collect::<Vec<_>>(),
        vec![Reg16::Pc]
    );
    let report = divergence::render(step, &divergence);
    assert!(
        report.lines().any(|l| l == "PC: Got: 0213, Expected: 0214 *"),
        "{report}"
    );
    assert_eq!(steps_sent(&probe, "subject"), 5);
    assert_eq!(steps_sent(&probe, "reference"), 5);
    Ok(())
}

#[test]
fn closed_reference_exhausts_without_a_verdict() -> Result<()> {
    let mut reference = options(Style::Gddb, 8, 10);
    reference.exit_after = Some(50);
    let (mut engine, probe) = engine(options(Style::Gameboy, 8, 10), reference, None);

    let outcome = engine.run()?;
    let RunOutcome::Exhausted { step, side, reason } = &outcome else {
        bail!("expected exhaustion, got {outcome:?}");
    };
    assert_eq!((*step, *side), (51, Side::Reference));
    assert!(reason.contains("closed"), "{reason}");
    assert!(!outcome.is_divergence());
    assert!(probe.terminated("subject"));
    Ok(())
}

#[test]
fn half_register_subject_agrees_with_pair_reference() -> Result<()> {
    let mut subject = options(Style::Gameboy, 31, 4);
    subject.half_registers = true;
    let (mut engine, _probe) = engine(subject, options(Style::Gddb, 31, 40), Some(250));
    assert_eq!(engine.run()?, RunOutcome::Completed { steps: 250 });
    Ok(())
}

#[test]
fn no_target_runs_ahead_of_a_comparison() -> Result<()> {
    let (mut engine, probe) = engine(
        options(Style::Gameboy, 2, 12),
        options(Style::Gddb, 2, 12),
        Some(200),
    );
    engine.run()?;

    let mut shown = [0usize; 2];
    let mut stepped = [0usize; 2];
    for (name, cmd) in probe.commands() {
        let idx = usize::from(name == "reference");
        match cmd {
            Command::ShowRegisters => shown[idx] += 1,
            Command::Step => {
                stepped[idx] += 1;
                // Step N may only be issued once both sides reported step N-1.
                assert!(stepped[idx] <= shown[0].min(shown[1]));
            }
            _ => {}
        }
    }
    assert_eq!(stepped, [199, 199]);
    Ok(())
}

/// Hands the wrapped target's output over in two halves, so every register
/// dump arrives truncated at first.
struct Chunked<T> {
    inner: T,
    held: Vec<u8>,
}

impl<T: Target> Target for Chunked<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn send(&mut self, cmd: &Command) -> TargetResult<()> {
        self.inner.send(cmd)
    }

    fn read_step(&mut self) -> TargetResult<Vec<u8>> {
        if !self.held.is_empty() {
            return Ok(std::mem::take(&mut self.held));
        }
        let mut out = self.inner.read_step()?;
        self.held = out.split_off(out.len() / 2);
        Ok(out)
    }

    fn terminate(&mut self) -> TargetResult<()> {
        self.inner.terminate()
    }
}

#[test]
fn truncated_dumps_are_reread_not_compared() -> Result<()> {
    let probe = Probe::default();
    let subject = ScriptedTarget::new("subject", options(Style::Gameboy, 6, 9), probe.clone());
    let extractor = subject.syntax().extractor();
    let subject = Lane::new(
        Side::Subject,
        Box::new(Chunked {
            inner: subject,
            held: Vec::new(),
        }),
        extractor,
    );
    let reference = lane(Side::Reference, options(Style::Gddb, 6, 3), &probe);
    let mut engine = Engine::new(
        subject,
        reference,
        EngineConfig {
            breakpoint: Some(ENTRY),
            max_steps: Some(100),
            ..EngineConfig::default()
        },
    );
    assert_eq!(engine.run()?, RunOutcome::Completed { steps: 100 });
    Ok(())
}

/// Stops answering after `reads` successful reads.
struct Stalling<T> {
    inner: T,
    reads: u32,
}

impl<T: Target> Target for Stalling<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn send(&mut self, cmd: &Command) -> TargetResult<()> {
        self.inner.send(cmd)
    }

    fn read_step(&mut self) -> TargetResult<Vec<u8>> {
        if self.reads == 0 {
            return Err(TargetError::Stalled {
                target: self.inner.name().to_string(),
                waited: Duration::from_millis(50),
            });
        }
        self.reads -= 1;
        self.inner.read_step()
    }

    fn terminate(&mut self) -> TargetResult<()> {
        self.inner.terminate()
    }
}

#[test]
fn stall_mid_run_is_a_harness_error() -> Result<()> {
    let probe = Probe::default();
    let subject = lane(Side::Subject, options(Style::Gameboy, 4, 6), &probe);
    let reference = ScriptedTarget::new("reference", options(Style::Gddb, 4, 6), probe.clone());
    let extractor = reference.syntax().extractor();
    let reference = Lane::new(
        Side::Reference,
        Box::new(Stalling {
            inner: reference,
            reads: 11,
        }),
        extractor,
    );
    let mut engine = Engine::new(
        subject,
        reference,
        EngineConfig {
            breakpoint: Some(ENTRY),
            ..EngineConfig::default()
        },
    );

    let mut compared = 0u64;
    let Err(err) = engine.run_with(|_| compared += 1) else {
        bail!("a stalled reference must not end the run cleanly");
    };
    assert!(
        matches!(
            err,
            EngineError::Target {
                side: Side::Reference,
                source: TargetError::Stalled { .. },
            }
        ),
        "{err}"
    );
    // The alignment read plus ten steps were answered.
    assert_eq!(compared, 11);
    assert!(probe.terminated("subject"));
    assert!(probe.terminated("reference"));
    Ok(())
}
