use std::time::Duration;

/// Knobs of one lockstep run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Shared address both targets run to before comparison starts. `None`
    /// compares from wherever the targets currently are.
    pub breakpoint: Option<u16>,
    /// Stop cleanly after this many compared steps.
    pub max_steps: Option<u64>,
    /// Extra reads allowed when a text dump arrives truncated.
    pub transient_retries: u32,
    /// How long a target may take to stop at the breakpoint.
    pub align_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            breakpoint: None,
            max_steps: None,
            transient_retries: 8,
            align_timeout: Duration::from_secs(30),
        }
    }
}
