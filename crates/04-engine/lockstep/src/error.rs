use std::time::Duration;

use state_extract::ExtractError;
use target_driver::TargetError;
use thiserror::Error;

use crate::Side;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures of the harness itself, as opposed to a register divergence.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A target could not be driven.
    #[error("{side} target failed")]
    Target {
        /// Side that failed.
        side: Side,
        /// Driver error.
        #[source]
        source: TargetError,
    },

    /// A target's output never held a complete register dump.
    #[error("{side} target produced no usable register dump after {attempts} read(s)")]
    Extract {
        /// Side that failed.
        side: Side,
        /// Reads spent on the dump.
        attempts: u32,
        /// Last extraction failure.
        #[source]
        source: ExtractError,
    },

    /// A target never stopped at the alignment breakpoint.
    #[error("{side} target did not stop at {breakpoint:#06x} within {waited:?}")]
    Misaligned {
        /// Side that failed.
        side: Side,
        /// Expected program counter.
        breakpoint: u16,
        /// Time spent waiting.
        waited: Duration,
        /// Last program counter observed, if any.
        last_pc: Option<u16>,
    },
}

impl EngineError {
    /// Side responsible for the failure.
    pub fn side(&self) -> Side {
        match self {
            EngineError::Target { side, .. }
            | EngineError::Extract { side, .. }
            | EngineError::Misaligned { side, .. } => *side,
        }
    }
}
