//! Collector façade: capability probe, collection entry point, snapshot
//! accessors.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::collector::delta::compute_delta;
use crate::collector::procfs::process::ProcessReader;
use crate::collector::procfs::{PidStat, ReadError};
use crate::collector::smaps::SmapsRollup;
use crate::collector::traits::FileSystem;
use crate::model::StatsByUid;

/// PID whose files are probed by `init`; PID 1 always exists.
const PID_FOR_INIT: u32 = 1;

/// Error returned by [`UidProcStatsCollector::collect`].
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// The capability probe failed or was never run; `init` must enable the
    /// collector before collection.
    Disabled,
    /// A procfs file failed to parse, aborting the collection. The stored
    /// snapshots are left unchanged.
    Read(ReadError),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "collector is disabled: pid stat files are not accessible"),
            Self::Read(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<ReadError> for CollectError {
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    is_enabled: bool,
    is_time_in_state_enabled: bool,
    latest_stats: StatsByUid,
    delta_stats: StatsByUid,
}

/// Per-UID process statistics collector.
///
/// Each [`collect`](Self::collect) scans the PID directories under the root
/// path, folds per-process and per-thread counters under the owning UID,
/// and stores two snapshots: the latest absolute values and the delta since
/// the previous collection. Both are replaced atomically under one lock, so
/// a failed collection never publishes partial results.
///
/// Call [`init`](Self::init) once after construction to probe file access
/// and enable collection; the probe is idempotent and may be repeated.
pub struct UidProcStatsCollector<F: FileSystem> {
    reader: ProcessReader<F>,
    state: Mutex<CollectorState>,
}

impl<F: FileSystem> UidProcStatsCollector<F> {
    /// Creates a collector scanning `root_path` (usually `/proc`).
    ///
    /// `smaps_rollup_supported` states whether the kernel provides
    /// `smaps_rollup`; when it does, a collaborator must be wired in with
    /// [`with_smaps_reader`](Self::with_smaps_reader) for memory profiling
    /// to use it.
    pub fn new(fs: F, root_path: impl Into<PathBuf>, smaps_rollup_supported: bool) -> Self {
        let mut reader = ProcessReader::new(fs, root_path);
        reader.smaps_rollup_supported = smaps_rollup_supported;
        Self {
            reader,
            state: Mutex::new(CollectorState::default()),
        }
    }

    /// Enables or disables memory profiling (smaps rollup with `statm`
    /// fallback).
    pub fn with_memory_profiling(mut self, enabled: bool) -> Self {
        self.reader.memory_profiling = enabled;
        self
    }

    /// Wires in the external smaps-rollup collaborator.
    pub fn with_smaps_reader(mut self, smaps: Box<dyn SmapsRollup>) -> Self {
        self.reader.smaps = smaps;
        self
    }

    /// Overrides the clock tick rate (USER_HZ) captured at construction.
    pub fn with_clock_ticks_per_second(mut self, ticks: u64) -> Self {
        let ticks = ticks.max(1);
        self.reader.millis_per_clock_tick = 1000 / ticks;
        self.reader.cycles_per_khz_clock_tick = 1000 / ticks;
        self
    }

    /// Overrides the page size captured at construction.
    pub fn with_page_size_bytes(mut self, bytes: u64) -> Self {
        self.reader.page_size_kb = (bytes / 1024).max(1);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Probes read access on the files of PID 1 and enables collection when
    /// the required ones are readable. Also decides whether per-thread
    /// `time_in_state` files are usable on this kernel.
    pub fn init(&self) {
        let pid_stat_path = self.reader.stat_path(PID_FOR_INIT);
        let tid_stat_path = self.reader.thread_stat_path(PID_FOR_INIT, PID_FOR_INIT);
        let pid_status_path = self.reader.status_path(PID_FOR_INIT);
        let statm_path = self.reader.statm_path(PID_FOR_INIT);
        let tis_path = self.reader.time_in_state_path(PID_FOR_INIT, PID_FOR_INIT);

        let pid_stat_ok = self.reader.can_read(&pid_stat_path);
        let tid_stat_ok = self.reader.can_read(&tid_stat_path);
        let pid_status_ok = self.reader.can_read(&pid_status_path);
        let statm_ok = self.reader.memory_profiling && self.reader.can_read(&statm_path);

        let mut is_enabled = pid_stat_ok && tid_stat_ok && pid_status_ok;
        if self.reader.memory_profiling {
            is_enabled &= statm_ok || self.reader.smaps_rollup_supported;
        }

        let is_time_in_state_enabled = match self.reader.read_time_in_state(&tis_path) {
            Ok(cycles) => cycles > 0,
            Err(e) => {
                debug!(error = %e, "time_in_state probe failed");
                false
            }
        };

        if !is_time_in_state_enabled {
            warn!(
                path = %tis_path.display(),
                "time_in_state collection is not enabled; missing or unusable time_in_state file"
            );
        }

        if !is_enabled {
            let mut inaccessible = Vec::new();
            if !pid_stat_ok {
                inaccessible.push(pid_stat_path);
            }
            if !tid_stat_ok {
                inaccessible.push(tid_stat_path);
            }
            if !pid_status_ok {
                inaccessible.push(pid_status_path);
            }
            if self.reader.memory_profiling && !statm_ok {
                inaccessible.push(statm_path);
            }
            let inaccessible: Vec<String> =
                inaccessible.iter().map(|p| p.display().to_string()).collect();
            error!(
                paths = %inaccessible.join(", "),
                "disabling the collector: required files are not accessible"
            );
        }

        let mut state = self.lock_state();
        state.is_enabled = is_enabled;
        state.is_time_in_state_enabled = is_time_in_state_enabled;
    }

    /// Collects a new snapshot and recomputes the delta against the
    /// previous one.
    ///
    /// On error the stored snapshots are left untouched; on success both
    /// are replaced under the lock before returning.
    pub fn collect(&self) -> Result<(), CollectError> {
        let mut state = self.lock_state();
        if !state.is_enabled {
            return Err(CollectError::Disabled);
        }

        let curr = self
            .reader
            .read_uid_stats(state.is_time_in_state_enabled, &state.latest_stats)?;
        state.delta_stats = compute_delta(&state.latest_stats, &curr);
        state.latest_stats = curr;
        Ok(())
    }

    /// Returns a copy of the latest absolute snapshot.
    pub fn latest_stats(&self) -> StatsByUid {
        self.lock_state().latest_stats.clone()
    }

    /// Returns a copy of the delta computed by the most recent collection.
    pub fn delta_stats(&self) -> StatsByUid {
        self.lock_state().delta_stats.clone()
    }

    /// Whether the capability probe enabled collection.
    pub fn enabled(&self) -> bool {
        self.lock_state().is_enabled
    }

    /// Whether per-thread `time_in_state` files are collected.
    pub fn time_in_state_enabled(&self) -> bool {
        self.lock_state().is_time_in_state_enabled
    }

    /// Reads one process's `stat` file without a full collection.
    pub fn read_stat_for_pid(&self, pid: u32) -> Result<PidStat, ReadError> {
        self.reader.read_pid_stat(&self.reader.stat_path(pid))
    }

    /// Reads one process's owning UID and Tgid without a full collection.
    pub fn read_status_for_pid(&self, pid: u32) -> Result<(u32, u32), ReadError> {
        self.reader.read_pid_status(&self.reader.status_path(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, SharedMockFs, stat_line, time_in_state_content};
    use std::sync::{Arc, RwLock};

    fn collector(fs: MockFs) -> UidProcStatsCollector<MockFs> {
        let collector = UidProcStatsCollector::new(fs, "/proc", false);
        collector.init();
        collector
    }

    fn shared_collector(fs: MockFs) -> (SharedMockFs, UidProcStatsCollector<SharedMockFs>) {
        let shared: SharedMockFs = Arc::new(RwLock::new(fs));
        let collector = UidProcStatsCollector::new(Arc::clone(&shared), "/proc", false);
        collector.init();
        (shared, collector)
    }

    #[test]
    fn test_init_enables_on_typical_system() {
        let collector = collector(MockFs::typical_system());
        assert!(collector.enabled());
        assert!(collector.time_in_state_enabled());
    }

    #[test]
    fn test_init_disables_without_pid_one_stat() {
        let mut fs = MockFs::typical_system();
        fs.remove_file("/proc/1/stat");
        let collector = collector(fs);

        assert!(!collector.enabled());
        assert_eq!(collector.collect(), Err(CollectError::Disabled));
        assert!(collector.latest_stats().is_empty());
    }

    #[test]
    fn test_init_without_time_in_state() {
        let mut fs = MockFs::typical_system();
        fs.remove_file("/proc/1/task/1/time_in_state");
        let collector = collector(fs);

        assert!(collector.enabled());
        assert!(!collector.time_in_state_enabled());

        collector.collect().unwrap();
        let latest = collector.latest_stats();
        assert_eq!(latest[&1000].cpu_cycles, 0);
    }

    #[test]
    fn test_init_memory_profiling_requires_statm_or_smaps() {
        let mut fs = MockFs::typical_system();
        fs.remove_file("/proc/1/statm");

        let collector = UidProcStatsCollector::new(fs.clone(), "/proc", false)
            .with_memory_profiling(true);
        collector.init();
        assert!(!collector.enabled());

        // With smaps rollup support the statm probe is not required.
        let collector =
            UidProcStatsCollector::new(fs, "/proc", true).with_memory_profiling(true);
        collector.init();
        assert!(collector.enabled());
    }

    #[test]
    fn test_init_is_idempotent() {
        let collector = collector(MockFs::typical_system());
        collector.init();
        collector.init();
        assert!(collector.enabled());
        collector.collect().unwrap();
    }

    #[test]
    fn test_first_collection_delta_equals_latest() {
        let collector = collector(MockFs::single_process_system());
        collector.collect().unwrap();

        let latest = collector.latest_stats();
        let delta = collector.delta_stats();
        assert_eq!(latest, delta);

        let process = &latest[&42].process_stats_by_pid[&1000];
        assert_eq!(process.comm, "vehicle app");
        assert_eq!(process.cpu_time_ms, 300); // (10 + 20) ticks * 10 ms
        assert_eq!(process.start_time_ms, 5000);
        assert_eq!(process.total_major_faults, 7);
        assert_eq!(process.total_tasks_count, 1);
        assert_eq!(process.io_blocked_tasks_count, 0);
    }

    #[test]
    fn test_second_collection_produces_monotonic_delta() {
        let (shared, collector) = shared_collector(MockFs::single_process_system());
        collector.collect().unwrap();

        // The process accumulates CPU time and faults between collections.
        shared.write().unwrap().add_file(
            "/proc/1000/stat",
            stat_line(1000, "vehicle app", 'S', 10, 25, 20, 500),
        );
        collector.collect().unwrap();

        let delta = collector.delta_stats();
        let process = &delta[&42].process_stats_by_pid[&1000];
        assert_eq!(process.cpu_time_ms, 150); // (45 - 30) ticks * 10 ms
        assert_eq!(process.total_major_faults, 3);

        let latest = collector.latest_stats();
        assert_eq!(latest[&42].process_stats_by_pid[&1000].cpu_time_ms, 450);
    }

    #[test]
    fn test_pid_reuse_between_collections() {
        let (shared, collector) = shared_collector(MockFs::single_process_system());
        collector.collect().unwrap();

        // The pid is reused by a fresh process with a later start time and
        // a smaller CPU counter.
        {
            let mut fs = shared.write().unwrap();
            fs.add_file(
                "/proc/1000/stat",
                stat_line(1000, "vehicle app", 'S', 1, 5, 0, 900),
            );
            fs.add_file(
                "/proc/1000/task/1000/stat",
                stat_line(1000, "vehicle app", 'S', 1, 5, 0, 900),
            );
        }
        collector.collect().unwrap();

        let delta = collector.delta_stats();
        let process = &delta[&42].process_stats_by_pid[&1000];
        assert_eq!(process.cpu_time_ms, 50); // absolute, not 50 - 300
        assert_eq!(process.total_major_faults, 1);
        assert_eq!(process.start_time_ms, 9000);
    }

    #[test]
    fn test_thread_cycles_delta_between_collections() {
        let (shared, collector) = shared_collector(MockFs::single_process_system());
        collector.collect().unwrap();
        let first_cycles = collector.latest_stats()[&42].cpu_cycles;
        assert_eq!(first_cycles, 30_000_000); // 300000 kHz * 10 ticks * 10

        shared.write().unwrap().add_file(
            "/proc/1000/task/1000/time_in_state",
            time_in_state_content(&[(300_000, 25)]),
        );
        collector.collect().unwrap();

        let delta = collector.delta_stats();
        assert_eq!(delta[&42].cpu_cycles, 45_000_000); // 15 more ticks at 300 MHz
        assert_eq!(
            delta[&42].process_stats_by_pid[&1000].cpu_cycles_by_tid[&1000],
            45_000_000
        );
    }

    #[test]
    fn test_failed_collection_keeps_previous_snapshots() {
        let (shared, collector) = shared_collector(MockFs::single_process_system());
        collector.collect().unwrap();
        let latest_before = collector.latest_stats();
        let delta_before = collector.delta_stats();

        shared
            .write()
            .unwrap()
            .add_file("/proc/1000/stat", "garbage");
        let err = collector.collect().unwrap_err();
        assert!(matches!(err, CollectError::Read(ReadError::Parse(..))));

        assert_eq!(collector.latest_stats(), latest_before);
        assert_eq!(collector.delta_stats(), delta_before);
    }

    #[test]
    fn test_vanished_process_between_collections() {
        let (shared, collector) = shared_collector(MockFs::typical_system());
        collector.collect().unwrap();

        shared.write().unwrap().remove_tree("/proc/2000");
        collector.collect().unwrap();

        let latest = collector.latest_stats();
        assert!(!latest[&1000].process_stats_by_pid.contains_key(&2000));
        // The delta only covers surviving processes.
        let delta = collector.delta_stats();
        assert!(!delta[&1000].process_stats_by_pid.contains_key(&2000));
    }

    #[test]
    fn test_clock_tick_override() {
        let collector = UidProcStatsCollector::new(MockFs::single_process_system(), "/proc", false)
            .with_clock_ticks_per_second(250);
        collector.init();
        collector.collect().unwrap();

        // 30 ticks * 4 ms per tick.
        let latest = collector.latest_stats();
        assert_eq!(latest[&42].process_stats_by_pid[&1000].cpu_time_ms, 120);
    }

    #[test]
    fn test_page_size_override() {
        let collector = UidProcStatsCollector::new(MockFs::single_process_system(), "/proc", false)
            .with_memory_profiling(true)
            .with_page_size_bytes(16384);
        collector.init();
        collector.collect().unwrap();

        // statm resident pages 2000 * 16 Kb pages.
        let latest = collector.latest_stats();
        assert_eq!(latest[&42].process_stats_by_pid[&1000].rss_kb, 32_000);
        assert_eq!(latest[&42].total_rss_kb, 32_000);
    }

    #[test]
    fn test_read_helpers_for_single_pid() {
        let collector = collector(MockFs::single_process_system());

        let stat = collector.read_stat_for_pid(1000).unwrap();
        assert_eq!(stat.comm, "vehicle app");
        assert_eq!(stat.cpu_time_ms, 300);

        let (uid, tgid) = collector.read_status_for_pid(1000).unwrap();
        assert_eq!(uid, 42);
        assert_eq!(tgid, 1000);

        assert!(collector.read_stat_for_pid(9999).unwrap_err().is_warn());
    }

    #[test]
    fn test_accessors_return_copies() {
        let collector = collector(MockFs::single_process_system());
        collector.collect().unwrap();

        let mut copy = collector.latest_stats();
        copy.remove(&42);
        assert!(collector.latest_stats().contains_key(&42));
    }
}
