//! Run progress callbacks.

use crate::pipeline::RunOutput;

/// Progress callback for reporting run status.
pub trait RunProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before unit `current` of `total` is sent.
    fn unit_started(&self, current: usize, total: usize);
    /// Called when a unit failed and the sentinel was substituted.
    fn unit_failed(&self, index: usize, reason: &str);
    /// Called when the run completes.
    fn finished(&self, output: &RunOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn unit_started(&self, _current: usize, _total: usize) {}
    fn unit_failed(&self, _index: usize, _reason: &str) {}
    fn finished(&self, _output: &RunOutput) {}
}
