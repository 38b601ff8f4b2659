//! Stand-alone scripted debugger console speaking on stdin/stdout.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mock_debugger::{Console, ConsoleOptions, Override, Style};

/// Imitate a CPU debugger console over a deterministic register walk.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Scripted debugger console for lockstep tests",
    long_about = None
)]
struct Cli {
    /// Debugger dialect to speak.
    #[arg(long, value_enum, default_value_t = StyleArg::Gameboy)]
    style: StyleArg,
    /// Seed of the register walk after the entry point.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Boot instructions executed before the entry point.
    #[arg(long, default_value_t = 16)]
    boot_steps: u32,
    /// Entry point address (decimal or hex, e.g. 0x100).
    #[arg(long, value_parser = parse_u16, default_value = "0x100")]
    entry: u16,
    /// Print 8-bit register halves instead of pairs.
    #[arg(long)]
    half_registers: bool,
    /// Misreport a register at one step: STEP:REG=VALUE (repeatable).
    #[arg(long = "override", value_name = "STEP:REG=VALUE")]
    overrides: Vec<Override>,
    /// Exit instead of executing past this many instructions after entry.
    #[arg(long)]
    exit_after: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StyleArg {
    /// `(gameboy)` console with `NAME: 0x..` dumps.
    Gameboy,
    /// `gddb>` console with `NAME = 0x..` dumps.
    Gddb,
}

impl From<StyleArg> for Style {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Gameboy => Style::Gameboy,
            StyleArg::Gddb => Style::Gddb,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut console = Console::new(ConsoleOptions {
        style: cli.style.into(),
        seed: cli.seed,
        boot_steps: cli.boot_steps,
        entry: cli.entry,
        half_registers: cli.half_registers,
        overrides: cli.overrides,
        exit_after: cli.exit_after,
    });
    let prompt = console.style().prompt();

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    write!(stdout, "{prompt}").context("failed to write prompt")?;
    stdout.flush().context("failed to flush stdout")?;

    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;
        let reply = console.handle(&line);
        stdout
            .write_all(reply.output.as_bytes())
            .context("failed to write reply")?;
        if reply.exit {
            stdout.flush().context("failed to flush stdout")?;
            return Ok(());
        }
        write!(stdout, "{prompt}").context("failed to write prompt")?;
        stdout.flush().context("failed to flush stdout")?;
    }
    Ok(())
}

fn parse_u16(input: &str) -> Result<u16, String> {
    if let Some(stripped) = input.strip_prefix("0x") {
        u16::from_str_radix(stripped, 16).map_err(|_| format!("invalid hex value '{input}'"))
    } else {
        input
            .parse::<u16>()
            .map_err(|_| format!("invalid number '{input}'"))
    }
}
