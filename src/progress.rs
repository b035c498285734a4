//! For tracking conversion progress and aborting early

use crate::error::Phase;

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter: Send {
    /// Called when a phase starts, with the number of items it will go through.
    fn begin(&mut self, _phase: Phase, _total: u64) {}

    /// Called after each source has been extracted or each clip encoded.
    ///
    /// This method may return `false` to abort processing.
    fn increase(&mut self) -> bool;

    /// Called once at the end of a phase
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) -> bool {
        true
    }
}
