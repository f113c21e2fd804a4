//! Delta computation between two UID-keyed snapshots.
//!
//! The delta reports the monotonic increase of every counter since the
//! previous collection while the process set churns underneath: PIDs appear,
//! disappear, and get reused, threads come and go, and counters occasionally
//! move backwards. The rules:
//!
//! - a UID or PID absent from the previous snapshot contributes its current
//!   absolute values;
//! - a PID present in both snapshots only matches when its start time is
//!   unchanged, so a reused PID is treated as new;
//! - a counter that moved backwards (reset, or a vanished thread) reports
//!   its current value instead of underflowing;
//! - instantaneous gauges (task counts, rss, pss) always carry the current
//!   values.

use crate::model::{ProcessStats, StatsByUid, UidProcStats};

/// Counter delta that tolerates regressions: a counter that moved backwards
/// reports its current value.
fn monotonic_delta(curr: u64, prev: u64) -> u64 {
    if prev <= curr { curr - prev } else { curr }
}

/// Diffs one process against its previous incarnation (same pid, same start
/// time). The total cycle count is recomputed from the per-thread deltas so
/// it stays consistent with the per-TID map.
fn delta_process_stats(prev: &ProcessStats, curr: &ProcessStats) -> ProcessStats {
    let mut delta = curr.clone();
    delta.cpu_time_ms = monotonic_delta(curr.cpu_time_ms, prev.cpu_time_ms);
    delta.total_major_faults = monotonic_delta(curr.total_major_faults, prev.total_major_faults);

    delta.total_cpu_cycles = 0;
    for (&tid, &cycles) in &curr.cpu_cycles_by_tid {
        let delta_cycles = match prev.cpu_cycles_by_tid.get(&tid) {
            Some(&prev_cycles) if prev_cycles <= cycles => cycles - prev_cycles,
            _ => cycles,
        };
        delta.cpu_cycles_by_tid.insert(tid, delta_cycles);
        delta.total_cpu_cycles = delta.total_cpu_cycles.saturating_add(delta_cycles);
    }
    delta
}

/// Computes the delta snapshot between the previous and current collections,
/// keyed by the current UIDs.
pub(crate) fn compute_delta(prev: &StatsByUid, curr: &StatsByUid) -> StatsByUid {
    let mut delta_by_uid = StatsByUid::new();
    for (&uid, curr_stats) in curr {
        let Some(prev_stats) = prev.get(&uid) else {
            delta_by_uid.insert(uid, curr_stats.clone());
            continue;
        };

        let mut delta = UidProcStats {
            total_tasks_count: curr_stats.total_tasks_count,
            io_blocked_tasks_count: curr_stats.io_blocked_tasks_count,
            total_rss_kb: curr_stats.total_rss_kb,
            total_pss_kb: curr_stats.total_pss_kb,
            ..Default::default()
        };
        for (&pid, process_stats) in &curr_stats.process_stats_by_pid {
            let delta_process = match prev_stats.process_stats_by_pid.get(&pid) {
                Some(prev_process)
                    if prev_process.start_time_ms == process_stats.start_time_ms =>
                {
                    delta_process_stats(prev_process, process_stats)
                }
                // New pid, or a reused pid with a different start time.
                _ => process_stats.clone(),
            };
            delta.cpu_time_ms = delta.cpu_time_ms.saturating_add(delta_process.cpu_time_ms);
            delta.cpu_cycles = delta.cpu_cycles.saturating_add(delta_process.total_cpu_cycles);
            delta.total_major_faults = delta
                .total_major_faults
                .saturating_add(delta_process.total_major_faults);
            delta.process_stats_by_pid.insert(pid, delta_process);
        }
        delta_by_uid.insert(uid, delta);
    }
    delta_by_uid
}
