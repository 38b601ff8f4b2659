//! Raw-memory strategy for register blocks copied out of a live process.
//!
//! The block holds the six register pairs back to back in [`Reg16::ALL`]
//! order. The source process stores each 16-bit field low byte first, so every
//! field is byte-swapped before it is read as a big-endian value.

use register_snapshot::{Reg16, RegisterSnapshot};

use crate::{Extract, ExtractError, ExtractResult};

/// Bytes occupied by the six packed register pairs.
pub const REGISTER_BLOCK_LEN: usize = Reg16::ALL.len() * 2;

/// Size and byte-order description of the register block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawLayout {
    /// Bytes copied per read. At least [`REGISTER_BLOCK_LEN`]; trailing bytes
    /// past the registers are carried along but not decoded.
    pub block_len: usize,
    /// Whether each field must be byte-swapped before decoding.
    pub swap_bytes: bool,
}

impl Default for RawLayout {
    fn default() -> Self {
        Self {
            block_len: REGISTER_BLOCK_LEN,
            swap_bytes: true,
        }
    }
}

/// Decodes packed register blocks.
#[derive(Clone, Debug)]
pub struct RawMemory {
    layout: RawLayout,
}

impl RawMemory {
    /// Creates a decoder for `layout`.
    pub fn new(layout: RawLayout) -> Self {
        Self { layout }
    }

    /// Layout used by this decoder.
    pub fn layout(&self) -> RawLayout {
        self.layout
    }
}

impl Extract for RawMemory {
    fn extract(&self, raw: &[u8]) -> ExtractResult<RegisterSnapshot> {
        let needed = self.layout.block_len.max(REGISTER_BLOCK_LEN);
        if raw.len() < needed {
            return Err(ExtractError::ShortBlock {
                needed,
                got: raw.len(),
            });
        }

        let mut block = [0u8; REGISTER_BLOCK_LEN];
        block.copy_from_slice(&raw[..REGISTER_BLOCK_LEN]);
        if self.layout.swap_bytes {
            swap_halves(&mut block);
        }
        Ok(unpack(&block))
    }
}

/// Swaps the two bytes of every 16-bit field in place.
///
/// A trailing odd byte is left untouched.
pub fn swap_halves(block: &mut [u8]) {
    for pair in block.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Reads six big-endian fields in canonical order.
pub fn unpack(block: &[u8; REGISTER_BLOCK_LEN]) -> RegisterSnapshot {
    let mut values = [0u16; 6];
    for (value, field) in values.iter_mut().zip(block.chunks_exact(2)) {
        *value = u16::from_be_bytes([field[0], field[1]]);
    }
    RegisterSnapshot::from_array(values)
}

/// Packs a snapshot the way the source process stores it (low byte first).
pub fn pack(snapshot: &RegisterSnapshot) -> [u8; REGISTER_BLOCK_LEN] {
    let mut block = [0u8; REGISTER_BLOCK_LEN];
    for (field, value) in block.chunks_exact_mut(2).zip(snapshot.to_array()) {
        field.copy_from_slice(&value.to_le_bytes());
    }
    block
}
