#![deny(missing_docs)]
//! Field-level comparison of two register snapshots.
//!
//! [`compare`] is exact equality over the six register pairs. When anything
//! differs the result carries the whole picture, every field with both values
//! and the flags decoded from each `AF`, because a single flipped flag bit is
//! easy to overlook in a raw hex diff. Whether to stop is up to the caller.

pub mod render;

use register_snapshot::{Flags, Reg16, RegisterSnapshot};

pub use render::render;

/// One register pair as seen by both targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDiff {
    /// Register pair.
    pub reg: Reg16,
    /// Value from the target under test.
    pub got: u16,
    /// Value from the reference.
    pub expected: u16,
}

impl FieldDiff {
    /// Whether the two values differ.
    pub fn is_mismatch(&self) -> bool {
        self.got != self.expected
    }
}

/// Full description of a mismatching snapshot pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Divergence {
    /// Every register pair in canonical order, equal ones included.
    pub fields: [FieldDiff; 6],
    /// Flags decoded from the subject's `AF`.
    pub got_flags: Flags,
    /// Flags decoded from the reference's `AF`.
    pub expected_flags: Flags,
}

impl Divergence {
    fn new(got: &RegisterSnapshot, expected: &RegisterSnapshot) -> Self {
        let fields = Reg16::ALL.map(|reg| FieldDiff {
            reg,
            got: got.get(reg),
            expected: expected.get(reg),
        });
        Self {
            fields,
            got_flags: got.flags(),
            expected_flags: expected.flags(),
        }
    }

    /// Register pairs whose values differ, in canonical order.
    pub fn mismatched(&self) -> impl Iterator<Item = &FieldDiff> + '_ {
        self.fields.iter().filter(|field| field.is_mismatch())
    }

    /// Entry for one register pair.
    pub fn field(&self, reg: Reg16) -> &FieldDiff {
        &self.fields[reg.index()]
    }

    /// Snapshot of the target under test.
    pub fn got(&self) -> RegisterSnapshot {
        RegisterSnapshot::from_array(self.fields.map(|field| field.got))
    }

    /// Snapshot of the reference.
    pub fn expected(&self) -> RegisterSnapshot {
        RegisterSnapshot::from_array(self.fields.map(|field| field.expected))
    }
}

/// Outcome of comparing one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult {
    /// All six register pairs are equal.
    Match,
    /// At least one register pair differs.
    Mismatch(Divergence),
}

impl MatchResult {
    /// Whether the snapshots agreed.
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Match)
    }
}

/// Compares the subject's snapshot (`got`) against the reference (`expected`).
pub fn compare(got: &RegisterSnapshot, expected: &RegisterSnapshot) -> MatchResult {
    if got == expected {
        MatchResult::Match
    } else {
        MatchResult::Mismatch(Divergence::new(got, expected))
    }
}
