//! Boundary to the external smaps-rollup memory collaborator.
//!
//! Parsing `/proc/[pid]/smaps_rollup` is owned by a separate component; this
//! crate only consumes its summary. The trait keeps that component pluggable
//! and lets tests substitute fixed results.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Memory usage summary for one process, in kilobytes (Kb).
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MemoryUsage {
    /// Proportional set size.
    pub pss_kb: u64,
    /// Resident set size.
    pub rss_kb: u64,
    /// Unique set size.
    pub uss_kb: u64,
    /// Proportional swap usage.
    pub swap_pss_kb: u64,
}

/// Reads a memory usage summary from an `smaps_rollup` file.
pub trait SmapsRollup: Send + Sync {
    /// Returns the usage parsed from `path`, or `None` when the file cannot
    /// be read or understood.
    fn mem_usage(&self, path: &Path) -> Option<MemoryUsage>;
}

/// Collaborator used when none is wired in; always fails, so the collector
/// falls back to `statm`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSmapsRollup;

impl SmapsRollup for NoSmapsRollup {
    fn mem_usage(&self, _path: &Path) -> Option<MemoryUsage> {
        None
    }
}

/// Returns a fixed usage for every path. Test support.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedSmapsRollup(pub MemoryUsage);

#[cfg(test)]
impl SmapsRollup for FixedSmapsRollup {
    fn mem_usage(&self, _path: &Path) -> Option<MemoryUsage> {
        Some(self.0)
    }
}
