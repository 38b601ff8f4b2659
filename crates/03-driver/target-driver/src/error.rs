use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias for driver operations.
pub type TargetResult<T> = Result<T, TargetError>;

/// Failures raised while driving a target.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The target process could not be started.
    #[error("failed to spawn `{program}`")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// An external process could not be opened for memory access.
    #[error("failed to attach to process {pid}: {reason}")]
    Attach {
        /// Process id.
        pid: i32,
        /// Human-readable cause.
        reason: String,
    },

    /// The output channel closed: the target exited.
    #[error("{target}: output channel closed")]
    Closed {
        /// Target label.
        target: String,
    },

    /// No output arrived before the read deadline.
    #[error("{target}: no output within {waited:?}")]
    Stalled {
        /// Target label.
        target: String,
        /// Time spent waiting.
        waited: Duration,
    },

    /// Reading the register block out of the target's memory failed.
    #[error("{target}: memory read at {address:#x} failed")]
    MemoryRead {
        /// Target label.
        target: String,
        /// Virtual address of the block.
        address: u64,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The injected advance capability failed.
    #[error("{target}: advance failed")]
    Advance {
        /// Target label.
        target: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure on the target's channel.
    #[error("{target}: i/o error")]
    Io {
        /// Target label.
        target: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl TargetError {
    /// Whether the error means the target is gone (exited or inaccessible).
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            TargetError::Closed { .. } | TargetError::MemoryRead { .. }
        )
    }

    pub(crate) fn io(target: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::BrokenPipe {
            TargetError::Closed {
                target: target.to_string(),
            }
        } else {
            TargetError::Io {
                target: target.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_pipe_counts_as_closed() {
        let err = TargetError::io("subject", io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(err.is_exhausted());
        assert_eq!(err.to_string(), "subject: output channel closed");
    }

    #[test]
    fn os_error_is_only_in_the_source_chain() {
        use std::error::Error as _;

        let err = TargetError::Spawn {
            program: "/nope".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "failed to spawn `/nope`");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source, Some(io::Error::from(io::ErrorKind::NotFound).to_string()));
    }

    #[test]
    fn stall_is_not_exhaustion() {
        let err = TargetError::Stalled {
            target: "reference".into(),
            waited: Duration::from_millis(250),
        };
        assert!(!err.is_exhausted());
        assert_eq!(err.to_string(), "reference: no output within 250ms");
    }
}
