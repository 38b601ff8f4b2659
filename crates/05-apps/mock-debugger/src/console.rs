//! Line-oriented debugger console driving a [`Machine`].

use std::fmt::Write;
use std::str::FromStr;

use register_snapshot::{Reg16, RegisterSnapshot};
use target_driver::CommandSyntax;

use crate::machine::Machine;
use crate::MockError;

/// Upper bound on instructions run by one `continue`.
pub const CONTINUE_LIMIT: u64 = 1 << 20;

/// Which debugger the console imitates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    /// The subject emulator's console: `b`, `c`, `s`, `debug`, `NAME: 0x..`.
    Gameboy,
    /// The reference debugger: `break`, `step`, `show regs`, `NAME = 0x..`.
    Gddb,
}

impl Style {
    /// Command syntax a driver must use to talk to this console.
    pub fn syntax(self) -> CommandSyntax {
        match self {
            Style::Gameboy => CommandSyntax::gameboy(),
            Style::Gddb => CommandSyntax::gddb(),
        }
    }

    /// Prompt printed whenever the console waits for input.
    pub fn prompt(self) -> &'static str {
        match self {
            Style::Gameboy => "(gameboy) ",
            Style::Gddb => "gddb> ",
        }
    }
}

/// Replaces one reported register value at one step, leaving the machine
/// itself untouched. Written `STEP:REG=VALUE`, e.g. `5:PC=0x0213`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Override {
    /// Instructions executed since the entry point.
    pub step: u64,
    /// Register pair to replace.
    pub reg: Reg16,
    /// Reported value.
    pub value: u16,
}

impl FromStr for Override {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MockError::Override(s.to_string());
        let (step, assignment) = s.split_once(':').ok_or_else(bad)?;
        let (reg, value) = assignment.split_once('=').ok_or_else(bad)?;
        Ok(Self {
            step: step.trim().parse().map_err(|_| bad())?,
            reg: Reg16::from_name(reg.trim()).ok_or_else(bad)?,
            value: parse_number(value.trim(), 10)
                .and_then(|v| u16::try_from(v).ok())
                .ok_or_else(bad)?,
        })
    }
}

/// Behaviour of one console instance.
#[derive(Clone, Debug)]
pub struct ConsoleOptions {
    /// Dialect.
    pub style: Style,
    /// Seed of the register walk.
    pub seed: u64,
    /// Boot instructions before the entry point.
    pub boot_steps: u32,
    /// Address the boot code hands over to.
    pub entry: u16,
    /// Print 8-bit halves (`A:`, `F:`, ...) instead of pairs.
    pub half_registers: bool,
    /// Reported-value overrides.
    pub overrides: Vec<Override>,
    /// Exit when asked to execute past this many instructions after entry.
    pub exit_after: Option<u64>,
}

impl ConsoleOptions {
    /// Defaults for `style`: seed 1, no boot code, entry `0x0100`.
    pub fn new(style: Style) -> Self {
        Self {
            style,
            seed: 1,
            boot_steps: 0,
            entry: 0x0100,
            half_registers: false,
            overrides: Vec::new(),
            exit_after: None,
        }
    }
}

/// What the console did with one input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// Text printed before the next prompt.
    pub output: String,
    /// The console exited; no prompt follows.
    pub exit: bool,
}

impl Reply {
    fn text(output: String) -> Self {
        Self {
            output,
            exit: false,
        }
    }

    fn exit(output: String) -> Self {
        Self { output, exit: true }
    }
}

/// Debugger console state.
#[derive(Clone, Debug)]
pub struct Console {
    options: ConsoleOptions,
    machine: Machine,
    breakpoints: Vec<u16>,
    cycles: u64,
}

impl Console {
    /// Console over a fresh machine.
    pub fn new(options: ConsoleOptions) -> Self {
        let machine = Machine::new(options.seed, options.boot_steps, options.entry);
        Self {
            options,
            machine,
            breakpoints: Vec::new(),
            cycles: 0,
        }
    }

    /// Dialect of this console.
    pub fn style(&self) -> Style {
        self.options.style
    }

    /// Registers as the console reports them, overrides applied.
    pub fn registers(&self) -> RegisterSnapshot {
        let mut regs = self.machine.registers();
        if let Some(step) = self.machine.executed() {
            for o in self.options.overrides.iter().filter(|o| o.step == step) {
                regs = regs.with(o.reg, o.value);
            }
        }
        regs
    }

    /// Handles one input line.
    pub fn handle(&mut self, line: &str) -> Reply {
        let words: Vec<&str> = line.split_whitespace().collect();
        match (self.options.style, words.as_slice()) {
            (_, []) => Reply::text(String::new()),
            (Style::Gameboy, ["b" | "break", addr]) | (Style::Gddb, ["break", addr]) => {
                self.cmd_break(addr)
            }
            (Style::Gameboy, ["c" | "continue"]) => self.run(CONTINUE_LIMIT),
            (Style::Gameboy, ["s" | "step"]) | (Style::Gddb, ["step"]) => self.run(1),
            (Style::Gameboy, ["s" | "step", n]) | (Style::Gddb, ["step", n]) => {
                match parse_number(n, 10) {
                    Some(n) => self.run(n),
                    None => Reply::text(format!("Invalid count: {n}\n")),
                }
            }
            (Style::Gameboy, ["debug"]) | (Style::Gddb, ["show", "regs"]) => {
                Reply::text(self.dump())
            }
            (_, ["exit" | "quit"]) => Reply::exit(String::new()),
            (_, [cmd, ..]) => Reply::text(format!("Unknown command: {cmd}\n")),
        }
    }

    fn cmd_break(&mut self, addr: &str) -> Reply {
        let radix = match self.options.style {
            Style::Gameboy => 16,
            Style::Gddb => 10,
        };
        match parse_number(addr, radix).and_then(|a| u16::try_from(a).ok()) {
            Some(addr) => {
                self.breakpoints.push(addr);
                Reply::text(format!("Added breakpoint @ {addr:#06x}\n"))
            }
            None => Reply::text(format!("Invalid address: {addr}\n")),
        }
    }

    /// Executes up to `count` instructions, stopping early at a breakpoint.
    fn run(&mut self, count: u64) -> Reply {
        let mut out = String::new();
        for _ in 0..count {
            let limit = self.options.exit_after;
            if limit.is_some() && self.machine.executed() >= limit {
                return Reply::exit(out);
            }
            self.machine.step();
            self.cycles += 4;
            let pc = self.machine.registers().pc;
            if count > 1 && self.breakpoints.contains(&pc) {
                let _ = writeln!(out, "Breakpoint hit @ {pc:#06x}");
                return Reply::text(out);
            }
        }
        if count > 1 {
            let _ = writeln!(out, "Stopped after {count} instructions");
        }
        Reply::text(out)
    }

    fn dump(&self) -> String {
        let regs = self.registers();
        let mut out = String::new();
        match (self.options.style, self.options.half_registers) {
            (Style::Gddb, _) => {
                for reg in Reg16::ALL {
                    let _ = writeln!(out, "{reg} = {:#06x}", regs.get(reg));
                }
            }
            (Style::Gameboy, true) => {
                for (name, value) in [
                    ("A", regs.af >> 8),
                    ("F", regs.af & 0xFF),
                    ("B", regs.bc >> 8),
                    ("C", regs.bc & 0xFF),
                    ("D", regs.de >> 8),
                    ("E", regs.de & 0xFF),
                    ("H", regs.hl >> 8),
                    ("L", regs.hl & 0xFF),
                ] {
                    let label = format!("{name}:");
                    let _ = writeln!(out, "{label:<9}{value:#04x} [{value:08b}]");
                }
                for (name, value) in [("SP", regs.sp), ("PC", regs.pc)] {
                    let label = format!("{name}:");
                    let _ = writeln!(out, "{label:<9}{value:#06x} [{value:016b}]");
                }
                let _ = writeln!(out, "Cycles:  {}", self.cycles);
            }
            (Style::Gameboy, false) => {
                for reg in Reg16::ALL {
                    let label = format!("{reg}:");
                    let _ = writeln!(out, "{label:<9}{:#06x}", regs.get(reg));
                }
                let _ = writeln!(out, "Cycles:  {}", self.cycles);
            }
        }
        out
    }
}

/// Parses `0x`-prefixed hex, or a bare number in `radix`.
fn parse_number(input: &str, radix: u32) -> Option<u64> {
    match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => u64::from_str_radix(input, radix).ok(),
    }
}
