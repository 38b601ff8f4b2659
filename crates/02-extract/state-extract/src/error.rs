use register_snapshot::Reg16;
use thiserror::Error;

/// Result alias for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Reasons a snapshot could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The text dump ended before every register was printed.
    #[error("register dump incomplete, missing {}", names(.missing))]
    Incomplete {
        /// Pairs that were never assigned.
        missing: Vec<Reg16>,
    },

    /// The raw register block was shorter than the layout requires.
    #[error("raw register block too short: needed {needed} bytes, got {got}")]
    ShortBlock {
        /// Bytes required by the layout.
        needed: usize,
        /// Bytes actually provided.
        got: usize,
    },
}

impl ExtractError {
    /// Whether a fresh read may resolve the error.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Incomplete { .. })
    }
}

fn names(regs: &[Reg16]) -> String {
    regs.iter()
        .map(|reg| reg.name())
        .collect::<Vec<_>>()
        .join(", ")
}
