//! Infrastructure: scanners, report store, and the history rewriter

pub mod aggregator;
pub mod git;
pub mod report;
pub mod rewrite;
pub mod stream;
pub mod worktree;

use crate::domain::Finding;

/// Destination for raw findings emitted by the scanners.
///
/// Implementations are shared across concurrent keyword tasks; interior
/// locking is held only around index or dedup-set updates, never around I/O
/// waits on the subprocess side.
pub trait FindingSink: Send + Sync {
    fn record(&self, finding: Finding);
}
