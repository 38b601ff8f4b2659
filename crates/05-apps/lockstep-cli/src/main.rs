//! Runs a subject emulator and a reference in lockstep and reports the first
//! register divergence.
//!
//! Exit status: 0 when no divergence was found, 1 on a divergence, 2 when the
//! harness itself failed.

use std::ffi::OsString;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lockstep::{Engine, EngineConfig, Lane, RunOutcome, Side};
use state_extract::{Extractor, RawLayout, RawMemory};
use target_driver::{CommandSyntax, ProcessSpec, ProcessTarget, ReadDiscipline};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Text rendering of run outcomes.
mod render {
    use lockstep::RunOutcome;

    /// Format the final verdict of a run.
    pub fn outcome(outcome: &RunOutcome) -> String {
        match outcome {
            RunOutcome::Diverged { step, divergence } => divergence::render(*step, divergence),
            RunOutcome::Exhausted { step, side, reason } => {
                format!("No divergence: {side} target ended before step {step} ({reason})\n")
            }
            RunOutcome::Completed { steps } => {
                format!("No divergence in {steps} step(s)\n")
            }
        }
    }
}

/// Compare a subject emulator against a reference, one instruction at a time.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Lockstep register comparison of two emulators",
    long_about = None
)]
struct Cli {
    /// Address both targets run to before comparison starts (decimal or hex).
    #[arg(long, value_parser = parse_u16, value_name = "ADDR")]
    breakpoint: Option<u16>,

    /// Program started as the emulator under test.
    #[arg(long, value_name = "PROGRAM")]
    subject_cmd: OsString,
    /// Argument for the subject program (repeatable).
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    subject_arg: Vec<OsString>,
    /// Console dialect of the subject.
    #[arg(long, value_enum, default_value_t = Profile::Gameboy)]
    subject_profile: Profile,

    /// Program started as the reference.
    #[arg(
        long,
        value_name = "PROGRAM",
        required_unless_present = "reference_pid",
        conflicts_with = "reference_pid"
    )]
    reference_cmd: Option<OsString>,
    /// Argument for the reference program (repeatable).
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    reference_arg: Vec<OsString>,
    /// Console dialect of the reference.
    #[arg(long, value_enum, default_value_t = Profile::Gddb)]
    reference_profile: Profile,

    /// Observe an already running reference process through its memory.
    #[arg(long, value_name = "PID")]
    reference_pid: Option<i32>,
    /// Mapped module the register offset is relative to (default: first mapping).
    #[arg(long, value_name = "NAME", requires = "reference_pid")]
    reference_module: Option<String>,
    /// Offset of the register block from the module base (decimal or hex).
    #[arg(long, value_parser = parse_u64, default_value = "0x601E4", value_name = "OFFSET")]
    reference_offset: u64,
    /// Bytes read per observation of the register block.
    #[arg(long, default_value_t = state_extract::REGISTER_BLOCK_LEN)]
    reference_block_len: usize,
    /// Command run once per step to advance the observed process; without it
    /// the process is expected to be advanced externally.
    #[arg(long, value_name = "PROGRAM", requires = "reference_pid")]
    reference_advance: Option<OsString>,

    /// How text targets decide that a step's output is complete.
    #[arg(long, value_enum, default_value_t = Pacing::Prompt)]
    pacing: Pacing,
    /// Delay before reading under `--pacing delay`.
    #[arg(long, default_value_t = 5, value_name = "MS")]
    delay_ms: u64,
    /// Sleep between two reads of an unchanged register block.
    #[arg(long, default_value_t = 1, value_name = "MS")]
    poll_interval_ms: u64,
    /// Longest wait for a single step's output before reporting a stall.
    #[arg(long, default_value_t = 5_000, value_name = "MS")]
    read_timeout_ms: u64,
    /// Longest wait for a target to stop at the breakpoint.
    #[arg(long, default_value_t = 30_000, value_name = "MS")]
    align_timeout_ms: u64,

    /// Stop cleanly after this many compared steps.
    #[arg(long)]
    max_steps: Option<u64>,
    /// Extra reads allowed for a truncated register dump.
    #[arg(long, default_value_t = 8)]
    retries: u32,
    /// Print the subject PC at every compared step.
    #[arg(long)]
    trace: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Profile {
    /// `(gameboy)` console: `b`, `c`, `s`, `debug`; `NAME: 0x..` dumps.
    Gameboy,
    /// `gddb>` console: `break`, `step`, `show regs`; `NAME = 0x..` dumps.
    Gddb,
}

impl Profile {
    fn syntax(self) -> CommandSyntax {
        match self {
            Profile::Gameboy => CommandSyntax::gameboy(),
            Profile::Gddb => CommandSyntax::gddb(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Pacing {
    /// Read until the console prints its prompt again.
    Prompt,
    /// Sleep a fixed delay, then take whatever output is there.
    Delay,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            breakpoint: self.breakpoint,
            max_steps: self.max_steps,
            transient_retries: self.retries,
            align_timeout: Duration::from_millis(self.align_timeout_ms),
        }
    }

    fn discipline(&self, syntax: &CommandSyntax) -> ReadDiscipline {
        let delay = Duration::from_millis(self.delay_ms);
        match self.pacing {
            Pacing::Prompt => ReadDiscipline::for_syntax(syntax, delay),
            Pacing::Delay => ReadDiscipline::FixedDelay { delay },
        }
    }

    fn text_lane(
        &self,
        side: Side,
        program: &OsString,
        args: &[OsString],
        profile: Profile,
    ) -> Result<Lane> {
        let syntax = profile.syntax();
        let extractor = syntax.extractor();
        let spec = ProcessSpec::new(program.clone()).args(args.iter().cloned());
        let target = ProcessTarget::spawn(
            side.to_string(),
            &spec,
            syntax.clone(),
            self.discipline(&syntax),
            Duration::from_millis(self.read_timeout_ms),
        )
        .with_context(|| format!("failed to start {side} target {}", program.to_string_lossy()))?;
        Ok(Lane::new(side, Box::new(target), extractor))
    }

    fn reference_lane(&self) -> Result<Lane> {
        match (&self.reference_cmd, self.reference_pid) {
            (Some(program), _) => self.text_lane(
                Side::Reference,
                program,
                &self.reference_arg,
                self.reference_profile,
            ),
            (None, Some(pid)) => self.memory_lane(pid),
            (None, None) => anyhow::bail!("either --reference-cmd or --reference-pid is required"),
        }
    }

    #[cfg(target_os = "linux")]
    fn memory_lane(&self, pid: i32) -> Result<Lane> {
        use target_driver::{
            Advance, CommandAdvance, LinuxProcess, ManualAdvance, MemoryTarget, PollConfig,
        };

        let process = LinuxProcess::attach(pid, self.reference_module.as_deref())
            .with_context(|| format!("failed to attach to reference process {pid}"))?;
        let address = process.base() + self.reference_offset;
        info!(pid, address = format_args!("{address:#x}"), "observing reference memory");

        let advance: Box<dyn Advance> = match &self.reference_advance {
            Some(program) => {
                Box::new(CommandAdvance::new(program.clone(), Vec::<OsString>::new()))
            }
            None => Box::new(ManualAdvance),
        };
        let layout = RawLayout {
            block_len: self.reference_block_len,
            ..RawLayout::default()
        };
        let target = MemoryTarget::new(
            Side::Reference.to_string(),
            Box::new(process),
            advance,
            address,
            layout.block_len.max(state_extract::REGISTER_BLOCK_LEN),
            PollConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                timeout: Duration::from_millis(self.read_timeout_ms),
            },
        );
        Ok(Lane::new(
            Side::Reference,
            Box::new(target),
            Extractor::Raw(RawMemory::new(layout)),
        ))
    }

    #[cfg(not(target_os = "linux"))]
    fn memory_lane(&self, pid: i32) -> Result<Lane> {
        anyhow::bail!("observing process {pid} through its memory is only supported on Linux")
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = run(&cli);
    match &result {
        Ok(outcome) => print!("{}", render::outcome(outcome)),
        Err(err) => eprintln!("error: {err:#}"),
    }
    ExitCode::from(exit_code(&result))
}

/// 0 when no divergence was found, 1 on a divergence, 2 when the harness failed.
fn exit_code(result: &Result<RunOutcome>) -> u8 {
    match result {
        Ok(outcome) if outcome.is_divergence() => 1,
        Ok(_) => 0,
        Err(_) => 2,
    }
}

fn run(cli: &Cli) -> Result<RunOutcome> {
    let subject = cli.text_lane(
        Side::Subject,
        &cli.subject_cmd,
        &cli.subject_arg,
        cli.subject_profile,
    )?;
    let reference = cli.reference_lane()?;
    info!(
        subject = subject.target().name(),
        reference = reference.target().name(),
        "targets started"
    );

    let mut engine = Engine::new(subject, reference, cli.engine_config());
    let trace = cli.trace;
    let outcome = engine
        .run_with(|record| {
            if trace {
                println!("{:04x}", record.subject.pc);
            }
        })
        .context("lockstep run failed")?;
    Ok(outcome)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_u16(input: &str) -> Result<u16, String> {
    let value = parse_u64(input)?;
    u16::try_from(value).map_err(|_| format!("address '{input}' does not fit in 16 bits"))
}

fn parse_u64(input: &str) -> Result<u64, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u64::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u64>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}
