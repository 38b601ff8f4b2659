#![deny(missing_docs)]
//! Decoding of [`RegisterSnapshot`]s from raw target output.
//!
//! Two strategies share one contract ([`Extract`]):
//! * [`TextPattern`] – scans line-oriented debugger dumps (`PC: 0x0100`,
//!   `PC = 0x0100`) and ignores every line that is not a register line.
//! * [`RawMemory`] – reinterprets a packed register block copied out of a live
//!   process, byte-swapping each 16-bit field first.
//!
//! Neither strategy ever yields a partial snapshot. A text dump that is missing
//! registers is reported as [`ExtractError::Incomplete`], which callers treat as
//! a truncated read and retry. A short raw block is a hard failure.

mod error;
mod raw;
mod text;

pub use error::{ExtractError, ExtractResult};
pub use raw::{pack, swap_halves, unpack, RawLayout, RawMemory, REGISTER_BLOCK_LEN};
pub use text::{Separator, TextPattern};

use register_snapshot::RegisterSnapshot;

/// Decodes one complete register snapshot from a target's raw output.
pub trait Extract {
    /// Extracts a snapshot from `raw`, never returning a partial one.
    fn extract(&self, raw: &[u8]) -> ExtractResult<RegisterSnapshot>;
}

/// Strategy selected per target.
#[derive(Clone, Debug)]
pub enum Extractor {
    /// Line-oriented text dumps.
    Text(TextPattern),
    /// Packed register block read from process memory.
    Raw(RawMemory),
}

impl Extractor {
    /// Text strategy for `NAME: 0xHHHH` dumps.
    pub fn colon() -> Self {
        Extractor::Text(TextPattern::new(Separator::Colon))
    }

    /// Text strategy for `NAME = 0xHHHH` dumps.
    pub fn equals() -> Self {
        Extractor::Text(TextPattern::new(Separator::Equals))
    }

    /// Raw-memory strategy with the default block layout.
    pub fn raw() -> Self {
        Extractor::Raw(RawMemory::new(RawLayout::default()))
    }
}

impl Extract for Extractor {
    fn extract(&self, raw: &[u8]) -> ExtractResult<RegisterSnapshot> {
        match self {
            Extractor::Text(text) => text.extract(raw),
            Extractor::Raw(mem) => mem.extract(raw),
        }
    }
}
