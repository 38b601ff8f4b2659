use std::fmt;

use crate::{Flags, Reg16};

/// Register state of one target at one instruction boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegisterSnapshot {
    /// Accumulator and flags.
    pub af: u16,
    /// `BC` pair.
    pub bc: u16,
    /// `DE` pair.
    pub de: u16,
    /// `HL` pair.
    pub hl: u16,
    /// Stack pointer.
    pub sp: u16,
    /// Program counter.
    pub pc: u16,
}

impl RegisterSnapshot {
    /// Builds a snapshot from values listed in [`Reg16::ALL`] order.
    pub const fn from_array(values: [u16; 6]) -> Self {
        Self {
            af: values[0],
            bc: values[1],
            de: values[2],
            hl: values[3],
            sp: values[4],
            pc: values[5],
        }
    }

    /// Returns the values in [`Reg16::ALL`] order.
    pub const fn to_array(self) -> [u16; 6] {
        [self.af, self.bc, self.de, self.hl, self.sp, self.pc]
    }

    /// Reads a single register pair.
    #[inline]
    pub const fn get(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::Af => self.af,
            Reg16::Bc => self.bc,
            Reg16::De => self.de,
            Reg16::Hl => self.hl,
            Reg16::Sp => self.sp,
            Reg16::Pc => self.pc,
        }
    }

    /// Returns a copy with one register pair replaced.
    pub fn with(mut self, reg: Reg16, value: u16) -> Self {
        match reg {
            Reg16::Af => self.af = value,
            Reg16::Bc => self.bc = value,
            Reg16::De => self.de = value,
            Reg16::Hl => self.hl = value,
            Reg16::Sp => self.sp = value,
            Reg16::Pc => self.pc = value,
        }
        self
    }

    /// Flags derived from `AF`.
    #[inline]
    pub const fn flags(&self) -> Flags {
        Flags::from_af(self.af)
    }
}

impl fmt::Display for RegisterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF={:04x} BC={:04x} DE={:04x} HL={:04x} SP={:04x} PC={:04x} F={}",
            self.af,
            self.bc,
            self.de,
            self.hl,
            self.sp,
            self.pc,
            self.flags()
        )
    }
}

/// Accumulates register values decoded piecemeal from target output.
///
/// A pair counts as assigned once its full 16-bit value was set, or once both
/// of its 8-bit halves were. Later assignments overwrite earlier ones.
#[derive(Clone, Debug, Default)]
pub struct SnapshotBuilder {
    pairs: [Option<u16>; 6],
    high: [Option<u8>; 6],
    low: [Option<u8>; 6],
}

impl SnapshotBuilder {
    /// Creates a builder with nothing assigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a full register pair.
    pub fn set(&mut self, reg: Reg16, value: u16) -> &mut Self {
        let idx = reg.index();
        self.pairs[idx] = Some(value);
        self.high[idx] = None;
        self.low[idx] = None;
        self
    }

    /// Assigns one 8-bit half of a register pair.
    pub fn set_half(&mut self, reg: Reg16, high: bool, value: u8) -> &mut Self {
        let idx = reg.index();
        if high {
            self.high[idx] = Some(value);
        } else {
            self.low[idx] = Some(value);
        }
        if let (Some(hi), Some(lo)) = (self.high[idx], self.low[idx]) {
            self.pairs[idx] = Some(u16::from_be_bytes([hi, lo]));
        }
        self
    }

    /// Register pairs that have not been assigned yet, in canonical order.
    pub fn missing(&self) -> Vec<Reg16> {
        Reg16::ALL
            .into_iter()
            .filter(|reg| self.pairs[reg.index()].is_none())
            .collect()
    }

    /// Returns `true` once all six pairs are assigned.
    pub fn is_complete(&self) -> bool {
        self.pairs.iter().all(Option::is_some)
    }

    /// Produces the snapshot, or the list of unassigned pairs.
    pub fn build(&self) -> Result<RegisterSnapshot, Vec<Reg16>> {
        let mut values = [0u16; 6];
        for (slot, pair) in values.iter_mut().zip(self.pairs.iter()) {
            match pair {
                Some(value) => *slot = *value,
                None => return Err(self.missing()),
            }
        }
        Ok(RegisterSnapshot::from_array(values))
    }
}

/// One compared step: the snapshot of each target at the same step index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// Zero-based index counted from the first instruction after alignment.
    pub step: u64,
    /// Snapshot reported by the emulator under test.
    pub subject: RegisterSnapshot,
    /// Snapshot reported by the reference implementation.
    pub reference: RegisterSnapshot,
}
