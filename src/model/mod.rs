//! Per-UID process statistics data model.
//!
//! These structures hold the counters collected from `/proc/[pid]/` and its
//! task subtree, aggregated per process and per owning UID. All counters are
//! unsigned 64-bit and saturate instead of wrapping; memory values are in
//! kilobytes (Kb).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of per-UID stats, keyed by the owning user id.
///
/// Produced wholesale by one collection pass and replaced on the next; it is
/// never mutated in place after publication.
pub type StatsByUid = HashMap<u32, UidProcStats>;

/// Statistics for a single process (thread group leader).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ProcessStats {
    /// Short executable name, without the surrounding brackets.
    /// Source: `/proc/[pid]/stat` field 2 (comm)
    pub comm: String,

    /// Process start time, milliseconds since boot.
    /// Source: `/proc/[pid]/stat` field 22 (starttime) scaled by the tick length
    pub start_time_ms: u64,

    /// User plus system CPU time of the main thread (ms).
    /// Source: `/proc/[pid]/stat` fields 14 + 15 (utime, stime)
    pub cpu_time_ms: u64,

    /// Estimated CPU cycles summed over threads with a readable
    /// `time_in_state` file.
    pub total_cpu_cycles: u64,

    /// Major page faults across the whole thread group. Taken from the
    /// process-level `stat` (persistent across thread churn), not summed
    /// from threads.
    /// Source: `/proc/[pid]/stat` field 12 (majflt)
    pub total_major_faults: u64,

    /// Number of threads observed during the scan, including the main thread.
    pub total_tasks_count: u64,

    /// Number of threads in uninterruptible I/O wait (state `D`).
    pub io_blocked_tasks_count: u64,

    /// Per-thread CPU cycle estimates. A thread without a readable, positive
    /// `time_in_state` result has no entry; absence means unknown, not zero.
    pub cpu_cycles_by_tid: HashMap<u32, u64>,

    /// Resident set size (Kb).
    pub rss_kb: u64,

    /// Proportional set size (Kb). Zero when memory profiling is off or the
    /// smaps rollup collaborator did not report it.
    pub pss_kb: u64,

    /// Unique set size (Kb).
    pub uss_kb: u64,

    /// Proportional swap usage (Kb).
    pub swap_pss_kb: u64,
}

/// Aggregated statistics for every process owned by one UID.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct UidProcStats {
    /// Sum of per-process `cpu_time_ms`, saturating.
    pub cpu_time_ms: u64,

    /// Sum of per-process `total_cpu_cycles`, saturating.
    pub cpu_cycles: u64,

    /// Sum of per-process `total_major_faults`, saturating.
    pub total_major_faults: u64,

    /// Total threads across the UID's processes.
    pub total_tasks_count: u64,

    /// Threads in uninterruptible I/O wait across the UID's processes.
    pub io_blocked_tasks_count: u64,

    /// Sum of per-process `rss_kb`, saturating.
    pub total_rss_kb: u64,

    /// Sum of per-process `pss_kb`, saturating.
    pub total_pss_kb: u64,

    /// The per-process stats this aggregate was folded from.
    pub process_stats_by_pid: HashMap<u32, ProcessStats>,
}

impl UidProcStats {
    /// Folds one process into the aggregate.
    ///
    /// Counter fields saturate; the two task counts use plain addition
    /// (thread counts never approach the 64-bit range).
    pub(crate) fn add_process(&mut self, pid: u32, stats: ProcessStats) {
        self.cpu_time_ms = self.cpu_time_ms.saturating_add(stats.cpu_time_ms);
        self.cpu_cycles = self.cpu_cycles.saturating_add(stats.total_cpu_cycles);
        self.total_major_faults = self.total_major_faults.saturating_add(stats.total_major_faults);
        self.total_tasks_count += stats.total_tasks_count;
        self.io_blocked_tasks_count += stats.io_blocked_tasks_count;
        self.total_rss_kb = self.total_rss_kb.saturating_add(stats.rss_kb);
        self.total_pss_kb = self.total_pss_kb.saturating_add(stats.pss_kb);
        self.process_stats_by_pid.insert(pid, stats);
    }
}

impl fmt::Display for ProcessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{comm: {}, start_time_ms: {}, cpu_time_ms: {}, total_cpu_cycles: {}, \
             total_major_faults: {}, total_tasks_count: {}, io_blocked_tasks_count: {}, \
             cpu_cycles_by_tid: {{",
            self.comm,
            self.start_time_ms,
            self.cpu_time_ms,
            self.total_cpu_cycles,
            self.total_major_faults,
            self.total_tasks_count,
            self.io_blocked_tasks_count,
        )?;
        // Sort for stable output; the map order is arbitrary.
        let mut tids: Vec<_> = self.cpu_cycles_by_tid.iter().collect();
        tids.sort_unstable();
        for (i, (tid, cycles)) in tids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{tid}: {cycles}")?;
        }
        write!(
            f,
            "}}, rss_kb: {}, pss_kb: {}, uss_kb: {}, swap_pss_kb: {}}}",
            self.rss_kb, self.pss_kb, self.uss_kb, self.swap_pss_kb
        )
    }
}

impl fmt::Display for UidProcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UidProcStats{{cpu_time_ms: {}, cpu_cycles: {}, total_major_faults: {}, \
             total_tasks_count: {}, io_blocked_tasks_count: {}, total_rss_kb: {}, \
             total_pss_kb: {}, process_stats_by_pid: {{",
            self.cpu_time_ms,
            self.cpu_cycles,
            self.total_major_faults,
            self.total_tasks_count,
            self.io_blocked_tasks_count,
            self.total_rss_kb,
            self.total_pss_kb,
        )?;
        let mut pids: Vec<_> = self.process_stats_by_pid.iter().collect();
        pids.sort_unstable_by_key(|(pid, _)| **pid);
        for (i, (pid, stats)) in pids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{pid}: {stats}")?;
        }
        write!(f, "}}}}")
    }
}
