//! Target-neutral commands and the console spellings used to send them.

use state_extract::{Extractor, Separator};

/// Commands the engine issues to a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Arm a breakpoint at the given address.
    Break(u16),
    /// Run freely until a breakpoint is hit.
    Continue,
    /// Execute exactly one instruction.
    Step,
    /// Print the current register file.
    ShowRegisters,
}

/// Console spelling of every [`Command`] for one debugger.
///
/// `break_template` must contain `{addr}`, which is replaced with the address in
/// lowercase hex without a prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSyntax {
    /// Template for [`Command::Break`].
    pub break_template: String,
    /// Line sent for [`Command::Continue`].
    pub continue_cmd: String,
    /// Line sent for [`Command::Step`].
    pub step_cmd: String,
    /// Line sent for [`Command::ShowRegisters`].
    pub show_registers_cmd: String,
    /// Prompt printed once a command completed, when the console has one.
    pub prompt: Option<String>,
    /// Separator used in the console's register dump.
    pub separator: Separator,
}

impl CommandSyntax {
    /// Console of the emulator under test (`b 213`, `c`, `s`, `debug`).
    pub fn gameboy() -> Self {
        Self {
            break_template: "b {addr}".to_string(),
            continue_cmd: "c".to_string(),
            step_cmd: "s".to_string(),
            show_registers_cmd: "debug".to_string(),
            prompt: Some("(gameboy)".to_string()),
            separator: Separator::Colon,
        }
    }

    /// `gddb` console of the reference emulator. It has no `continue`; a huge
    /// step count runs until the armed breakpoint stops it.
    pub fn gddb() -> Self {
        Self {
            break_template: "break 0x{addr}".to_string(),
            continue_cmd: "step 0xFFFFFFFF".to_string(),
            step_cmd: "step".to_string(),
            show_registers_cmd: "show regs".to_string(),
            prompt: Some("gddb>".to_string()),
            separator: Separator::Equals,
        }
    }

    /// Renders a command as the line to write (without the newline).
    pub fn render(&self, cmd: &Command) -> String {
        match cmd {
            Command::Break(addr) => self.break_template.replace("{addr}", &format!("{addr:x}")),
            Command::Continue => self.continue_cmd.clone(),
            Command::Step => self.step_cmd.clone(),
            Command::ShowRegisters => self.show_registers_cmd.clone(),
        }
    }

    /// Text extractor matching this console's dump format.
    pub fn extractor(&self) -> Extractor {
        match self.separator {
            Separator::Colon => Extractor::colon(),
            Separator::Equals => Extractor::equals(),
        }
    }
}
