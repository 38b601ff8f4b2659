//! End-to-end scenarios for the lockstep comparator, run in-process against
//! scripted targets.

#[cfg(test)]
mod lockstep_e2e;

#[cfg(test)]
mod memory_e2e;
