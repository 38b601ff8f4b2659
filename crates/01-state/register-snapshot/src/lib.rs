#![deny(missing_docs)]
//! Canonical CPU register state shared by every comparator layer.
//!
//! A [`RegisterSnapshot`] is the value both targets are reduced to before they
//! are compared. It is immutable once built, and the only way to build one from
//! piecemeal target output is through [`SnapshotBuilder`], which refuses to
//! produce a snapshot while any register pair is still unassigned.

mod flags;
mod reg;
mod snapshot;

pub use flags::Flags;
pub use reg::Reg16;
pub use snapshot::{RegisterSnapshot, SnapshotBuilder, StepRecord};
