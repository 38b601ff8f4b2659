//! Text-pattern strategy for debugger console dumps.

use regex::bytes::Regex;
use register_snapshot::{Reg16, RegisterSnapshot, SnapshotBuilder};

use crate::{Extract, ExtractError, ExtractResult};

/// Token separating a register name from its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Separator {
    /// `PC: 0x0100`
    Colon,
    /// `PC = 0x0100`
    Equals,
}

impl Separator {
    fn token(self) -> &'static str {
        match self {
            Separator::Colon => ":",
            Separator::Equals => "=",
        }
    }
}

/// Matches register lines in line-oriented output.
///
/// Pair lines (`AF: 0x01b0`) assign a pair directly; half lines (`A: 0x01`)
/// assign one byte and complete the pair once its partner is seen. Values are
/// decoded from at most four hex digits. Any line that does not match, or
/// whose value does not fit, is ignored.
#[derive(Clone, Debug)]
pub struct TextPattern {
    separator: Separator,
    line: Regex,
}

impl TextPattern {
    /// Builds a matcher for the given separator.
    pub fn new(separator: Separator) -> Self {
        let pattern = format!(
            r"(?m-u)(?:^|\s)(AF|BC|DE|HL|SP|PC|A|F|B|C|D|E|H|L)[ \t]*{}[ \t]*0[xX]([0-9A-Fa-f]{{1,4}})\b",
            regex::escape(separator.token())
        );
        let line = Regex::new(&pattern).expect("register line pattern is valid");
        Self { separator, line }
    }

    /// Separator this matcher was built for.
    pub fn separator(&self) -> Separator {
        self.separator
    }

    /// Feeds every register line in `raw` into `builder`.
    ///
    /// Later lines overwrite earlier ones, so when a buffer holds more than one
    /// dump the most recent values win.
    pub fn scan(&self, raw: &[u8], builder: &mut SnapshotBuilder) {
        for caps in self.line.captures_iter(raw) {
            let (Some(name), Some(digits)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let (Ok(name), Ok(digits)) = (
                std::str::from_utf8(name.as_bytes()),
                std::str::from_utf8(digits.as_bytes()),
            ) else {
                continue;
            };

            if let Some(reg) = Reg16::from_name(name) {
                if let Ok(value) = u16::from_str_radix(digits, 16) {
                    builder.set(reg, value);
                }
            } else if let Some((reg, high)) = Reg16::from_half_name(name) {
                if let Ok(value) = u8::from_str_radix(digits, 16) {
                    builder.set_half(reg, high, value);
                }
            }
        }
    }
}

impl Extract for TextPattern {
    fn extract(&self, raw: &[u8]) -> ExtractResult<RegisterSnapshot> {
        let mut builder = SnapshotBuilder::new();
        self.scan(raw, &mut builder);
        builder
            .build()
            .map_err(|missing| ExtractError::Incomplete { missing })
    }
}
