//! A console subject against a reference observed through process memory.

use std::time::Duration;

use anyhow::{bail, Result};
use lockstep::{Engine, EngineConfig, Lane, RunOutcome, Side};
use mock_debugger::{
    ConsoleOptions, Machine, Override, Probe, ScriptedProcess, ScriptedTarget, Style,
};
use pretty_assertions::assert_eq;
use register_snapshot::Reg16;
use state_extract::{Extractor, REGISTER_BLOCK_LEN};
use target_driver::{MemoryTarget, PollConfig, ProcessMemory};

const LAG: u32 = 3;

fn subject(seed: u64, overrides: Vec<Override>) -> Lane {
    let options = ConsoleOptions {
        seed,
        boot_steps: 30,
        overrides,
        ..ConsoleOptions::new(Style::Gameboy)
    };
    let target = ScriptedTarget::new("subject", options, Probe::default());
    let extractor = target.syntax().extractor();
    Lane::new(Side::Subject, Box::new(target), extractor)
}

fn reference(process: &ScriptedProcess) -> Lane {
    let target = MemoryTarget::new(
        "reference",
        Box::new(process.clone()),
        Box::new(process.clone()),
        0x601E4,
        REGISTER_BLOCK_LEN,
        PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        },
    );
    Lane::new(Side::Reference, Box::new(target), Extractor::raw())
}

fn config(max_steps: Option<u64>) -> EngineConfig {
    EngineConfig {
        breakpoint: Some(0x0100),
        max_steps,
        ..EngineConfig::default()
    }
}

#[test]
fn unchanged_blocks_are_not_compared() -> Result<()> {
    let process = ScriptedProcess::new(Machine::new(11, 0, 0x0100), LAG);
    let mut engine = Engine::new(subject(11, Vec::new()), reference(&process), config(Some(300)));

    let mut compared = 0u64;
    let outcome = engine.run_with(|_| compared += 1)?;
    assert_eq!(outcome, RunOutcome::Completed { steps: 300 });
    assert_eq!(compared, 300);
    // One read at the breakpoint, then LAG stale reads before every fresh one.
    assert_eq!(process.reads(), 1 + 299 * u64::from(LAG + 1));
    assert!(process.killed());
    Ok(())
}

#[test]
fn flag_mismatch_against_memory_is_reported() -> Result<()> {
    let process = ScriptedProcess::new(Machine::new(12, 0, 0x0100), LAG);
    let overrides = vec!["7:AF=0x0001".parse::<Override>()?];
    let mut engine = Engine::new(subject(12, overrides), reference(&process), config(None));

    let RunOutcome::Diverged { step, divergence } = engine.run()? else {
        bail!("expected a divergence");
    };
    assert_eq!(step, 7);
    assert_eq!(
        divergence.mismatched().map(|f| f.reg).collect::<Vec<_>>(),
        vec![Reg16::Af]
    );
    assert_eq!(divergence.field(Reg16::Af).got, 0x0001);
    assert!(process.killed());
    Ok(())
}

#[test]
fn vanished_reference_exhausts_the_run() -> Result<()> {
    let process = ScriptedProcess::new(Machine::new(13, 0, 0x0100), 0);
    let mut victim = process.clone();
    let mut engine = Engine::new(subject(13, Vec::new()), reference(&process), config(None));

    let outcome = engine.run_with(|record| {
        if record.step == 20 {
            ProcessMemory::terminate(&mut victim).expect("kill reference");
        }
    })?;
    let RunOutcome::Exhausted { step, side, reason } = &outcome else {
        bail!("expected exhaustion, got {outcome:?}");
    };
    assert_eq!((*step, *side), (21, Side::Reference));
    assert!(reason.contains("memory read"), "{reason}");
    Ok(())
}
