//! Lockstep runs against real `mock-debugger` processes over pipes.

use std::time::Duration;

use lockstep::{Engine, EngineConfig, Lane, RunOutcome, Side};
use mock_debugger::Style;
use pretty_assertions::assert_eq;
use register_snapshot::Reg16;
use target_driver::{ProcessSpec, ProcessTarget, ReadDiscipline, Target};

fn spawn(name: &str, style: Style, args: &[&str]) -> Lane {
    let discipline = ReadDiscipline::for_syntax(&style.syntax(), Duration::from_millis(5));
    spawn_with(name, style, args, discipline)
}

fn spawn_with(name: &str, style: Style, args: &[&str], discipline: ReadDiscipline) -> Lane {
    let spec = ProcessSpec::new(env!("CARGO_BIN_EXE_mock-debugger"))
        .arg("--style")
        .arg(match style {
            Style::Gameboy => "gameboy",
            Style::Gddb => "gddb",
        })
        .args(args.iter().copied());
    let syntax = style.syntax();
    let extractor = syntax.extractor();
    let target = ProcessTarget::spawn(name, &spec, syntax, discipline, Duration::from_secs(10))
        .expect("spawn mock-debugger");
    let side = if name == "subject" {
        Side::Subject
    } else {
        Side::Reference
    };
    Lane::new(side, Box::new(target), extractor)
}

fn config(max_steps: Option<u64>) -> EngineConfig {
    EngineConfig {
        breakpoint: Some(0x0100),
        max_steps,
        ..EngineConfig::default()
    }
}

#[test]
fn matching_consoles_run_clean() {
    let subject = spawn("subject", Style::Gameboy, &["--seed", "9", "--boot-steps", "40"]);
    let reference = spawn("reference", Style::Gddb, &["--seed", "9", "--boot-steps", "250"]);
    let mut engine = Engine::new(subject, reference, config(Some(300)));
    assert_eq!(engine.run().expect("run"), RunOutcome::Completed { steps: 300 });
}

#[test]
fn fixed_delay_pacing_runs_clean() {
    let delay = ReadDiscipline::FixedDelay {
        delay: Duration::from_millis(5),
    };
    let subject = spawn_with(
        "subject",
        Style::Gameboy,
        &["--seed", "21", "--boot-steps", "30"],
        delay.clone(),
    );
    let reference = spawn_with(
        "reference",
        Style::Gddb,
        &["--seed", "21", "--boot-steps", "7"],
        delay,
    );
    let mut engine = Engine::new(subject, reference, config(Some(150)));
    assert_eq!(engine.run().expect("run"), RunOutcome::Completed { steps: 150 });
}

#[test]
fn half_register_console_matches_pair_console() {
    let subject = spawn(
        "subject",
        Style::Gameboy,
        &["--seed", "4", "--boot-steps", "8", "--half-registers"],
    );
    let reference = spawn("reference", Style::Gddb, &["--seed", "4", "--boot-steps", "3"]);
    let mut engine = Engine::new(subject, reference, config(Some(100)));
    assert_eq!(engine.run().expect("run"), RunOutcome::Completed { steps: 100 });
}

#[test]
fn misreported_pc_is_caught_at_its_step() {
    let subject = spawn(
        "subject",
        Style::Gameboy,
        &["--seed", "2", "--boot-steps", "5", "--override", "5:PC=0x0213"],
    );
    let reference = spawn(
        "reference",
        Style::Gddb,
        &["--seed", "2", "--boot-steps", "5", "--override", "5:PC=0x0214"],
    );
    let mut engine = Engine::new(subject, reference, config(None));
    let outcome = engine.run().expect("run");
    let RunOutcome::Diverged { step, divergence } = outcome else {
        panic!("expected divergence, got {outcome:?}");
    };
    assert_eq!(step, 5);
    let pc = divergence.field(Reg16::Pc);
    assert_eq!((pc.got, pc.expected), (0x0213, 0x0214));
    let report = divergence::render(step, &divergence);
    assert!(
        report.lines().any(|l| l.starts_with("PC: Got: 0213, Expected: 0214")),
        "{report}"
    );
}

#[test]
fn exiting_reference_ends_the_run() {
    let subject = spawn("subject", Style::Gameboy, &["--seed", "3"]);
    let reference = spawn("reference", Style::Gddb, &["--seed", "3", "--exit-after", "50"]);
    let mut engine = Engine::new(subject, reference, config(None));
    let outcome = engine.run().expect("run");
    assert!(
        matches!(
            outcome,
            RunOutcome::Exhausted {
                step: 51,
                side: Side::Reference,
                ..
            }
        ),
        "{outcome:?}"
    );
}

#[test]
fn console_session_over_pipes() {
    let spec = ProcessSpec::new(env!("CARGO_BIN_EXE_mock-debugger")).args(["--boot-steps", "4"]);
    let syntax = Style::Gameboy.syntax();
    let discipline = ReadDiscipline::for_syntax(&syntax, Duration::ZERO);
    let timeout = Duration::from_secs(10);
    let mut target = ProcessTarget::spawn("console", &spec, syntax, discipline, timeout)
        .expect("spawn mock-debugger");
    target.send_line("b 100").expect("break");
    target.send_line("c").expect("continue");
    target.send_line("debug").expect("debug");
    let out = String::from_utf8(target.read_step().expect("read")).expect("utf8");
    assert!(out.contains("Added breakpoint @ 0x0100"), "{out}");
    assert!(out.contains("Breakpoint hit @ 0x0100"), "{out}");
    assert!(out.contains("PC:      0x0100"), "{out}");
    target.terminate().expect("terminate");
}
