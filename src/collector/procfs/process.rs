//! Per-PID stats assembly and per-UID aggregation.
//!
//! `ProcessReader` fuses one PID's `stat`, `status`, memory summary and task
//! subtree into a [`ProcessStats`] record, and folds every PID directory
//! under the root path into a UID-keyed snapshot. A PID or TID that vanishes
//! mid-scan is skipped; a malformed file aborts the whole scan so a partial
//! snapshot is never published.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collector::procfs::parser;
use crate::collector::procfs::{PidStat, ReadError};
use crate::collector::smaps::{NoSmapsRollup, SmapsRollup};
use crate::collector::traits::FileSystem;
use crate::model::{ProcessStats, StatsByUid};

/// Clock ticks per second (USER_HZ). Standard value for Linux; embedders
/// that probe a different value override it at collector construction.
const DEFAULT_CLOCK_TICKS_PER_SECOND: u64 = 100;

/// Default page size in bytes, likewise overridable at construction.
const DEFAULT_PAGE_SIZE_BYTES: u64 = 4096;

/// Reads and assembles process statistics from `/proc/[pid]/` subtrees.
pub(crate) struct ProcessReader<F: FileSystem> {
    pub(crate) fs: F,
    pub(crate) root: PathBuf,
    /// `1000 / clock_ticks_per_second`: length of one tick in ms.
    pub(crate) millis_per_clock_tick: u64,
    /// `1000 / clock_ticks_per_second`: scales a kHz×ticks sum to cycles.
    pub(crate) cycles_per_khz_clock_tick: u64,
    pub(crate) page_size_kb: u64,
    pub(crate) memory_profiling: bool,
    pub(crate) smaps_rollup_supported: bool,
    pub(crate) smaps: Box<dyn SmapsRollup>,
}

impl<F: FileSystem> ProcessReader<F> {
    pub(crate) fn new(fs: F, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            millis_per_clock_tick: 1000 / DEFAULT_CLOCK_TICKS_PER_SECOND,
            cycles_per_khz_clock_tick: 1000 / DEFAULT_CLOCK_TICKS_PER_SECOND,
            page_size_kb: (DEFAULT_PAGE_SIZE_BYTES / 1024).max(1),
            memory_profiling: false,
            smaps_rollup_supported: false,
            smaps: Box::new(NoSmapsRollup),
        }
    }

    pub(crate) fn stat_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("stat")
    }

    pub(crate) fn status_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("status")
    }

    pub(crate) fn statm_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("statm")
    }

    fn smaps_rollup_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("smaps_rollup")
    }

    pub(crate) fn task_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("task")
    }

    pub(crate) fn thread_stat_path(&self, pid: u32, tid: u32) -> PathBuf {
        self.task_dir(pid).join(tid.to_string()).join("stat")
    }

    pub(crate) fn time_in_state_path(&self, pid: u32, tid: u32) -> PathBuf {
        self.task_dir(pid).join(tid.to_string()).join("time_in_state")
    }

    /// Read-access probe used by the collector's capability check.
    pub(crate) fn can_read(&self, path: &Path) -> bool {
        self.fs.read_to_string(path).is_ok()
    }

    fn read_file(&self, path: &Path) -> Result<String, ReadError> {
        self.fs
            .read_to_string(path)
            .map_err(|e| ReadError::warn(path, e.to_string()))
    }

    /// Reads and parses a single-line `stat` file, process- or thread-level.
    pub(crate) fn read_pid_stat(&self, path: &Path) -> Result<PidStat, ReadError> {
        let content = self.read_file(path)?;
        let line =
            parser::single_line(&content).map_err(|e| ReadError::parse(path, e.message))?;
        parser::parse_pid_stat_line(line, self.millis_per_clock_tick)
            .map_err(|e| ReadError::parse(path, e.message))
    }

    /// Reads the owning UID and Tgid from a `status` file.
    pub(crate) fn read_pid_status(&self, path: &Path) -> Result<(u32, u32), ReadError> {
        let content = self.read_file(path)?;
        parser::parse_pid_status(&content).map_err(|e| ReadError::parse(path, e.message))
    }

    /// Reads a thread's estimated CPU cycles from its `time_in_state` file.
    pub(crate) fn read_time_in_state(&self, path: &Path) -> Result<u64, ReadError> {
        let content = self.read_file(path)?;
        parser::parse_time_in_state(&content, self.cycles_per_khz_clock_tick)
            .map_err(|e| ReadError::parse(path, e.message))
    }

    fn read_statm(&self, path: &Path) -> Result<(u64, u64), ReadError> {
        let content = self.read_file(path)?;
        parser::parse_statm(&content).map_err(|e| ReadError::parse(path, e.message))
    }

    /// Populates memory fields from the smaps-rollup collaborator.
    ///
    /// Returns whether the result is usable; a report with a zero pss, rss
    /// or uss is recorded but still sends the caller to the `statm`
    /// fallback.
    fn read_smaps_rollup(&self, pid: u32, stats: &mut ProcessStats) -> bool {
        if !self.smaps_rollup_supported {
            return false;
        }
        let path = self.smaps_rollup_path(pid);
        let Some(usage) = self.smaps.mem_usage(&path) else {
            return false;
        };
        stats.pss_kb = usage.pss_kb;
        stats.rss_kb = usage.rss_kb;
        stats.uss_kb = usage.uss_kb;
        stats.swap_pss_kb = usage.swap_pss_kb;
        usage.pss_kb > 0 && usage.rss_kb > 0 && usage.uss_kb > 0
    }

    /// Assembles the stats of one process leader.
    ///
    /// `prev` is the previous collection's snapshot, consulted to recover
    /// the UID of a process whose `status` file vanished mid-scan. Returns
    /// `Warn` for PIDs to skip (vanished, thread entries, unresolved UID)
    /// and `Parse` for malformed files.
    pub(crate) fn read_process_stats(
        &self,
        pid: u32,
        time_in_state_enabled: bool,
        prev: &StatsByUid,
    ) -> Result<(u32, ProcessStats), ReadError> {
        // 1. Top-level pid stat.
        let stat_path = self.stat_path(pid);
        let pid_stat = self.read_pid_stat(&stat_path)?;

        // 2. Owning UID and Tgid. If the status file vanished, the process
        // may still be known from the previous collection under the same
        // start time; recover its UID from there.
        let status_path = self.status_path(pid);
        let mut uid = None;
        let mut tgid = None;
        match self.read_pid_status(&status_path) {
            Ok((status_uid, status_tgid)) => {
                uid = Some(status_uid);
                tgid = Some(status_tgid);
            }
            Err(e) if e.is_warn() => {
                for (&prev_uid, prev_stats) in prev {
                    if let Some(prev_process) = prev_stats.process_stats_by_pid.get(&pid)
                        && prev_process.start_time_ms == pid_stat.start_time_ms
                    {
                        debug!(pid, uid = prev_uid, "recovered uid from previous collection");
                        uid = Some(prev_uid);
                        tgid = Some(pid);
                        break;
                    }
                }
            }
            Err(e) => return Err(e),
        }

        let Some(uid) = uid else {
            return Err(ReadError::warn(
                &status_path,
                format!("skipping pid {pid}: unresolved uid"),
            ));
        };
        if tgid != Some(pid) {
            return Err(ReadError::warn(
                &status_path,
                format!("skipping pid {pid}: tgid != pid"),
            ));
        }

        let mut stats = ProcessStats {
            comm: pid_stat.comm,
            start_time_ms: pid_stat.start_time_ms,
            cpu_time_ms: pid_stat.cpu_time_ms,
            // The top-level stat already aggregates major faults across the
            // thread group and survives thread churn; threads are not summed.
            total_major_faults: pid_stat.major_faults,
            total_tasks_count: 1,
            io_blocked_tasks_count: u64::from(pid_stat.state == 'D'),
            ..Default::default()
        };

        // 3. Memory usage summary.
        if self.memory_profiling && !self.read_smaps_rollup(pid, &mut stats) {
            let statm_path = self.statm_path(pid);
            match self.read_statm(&statm_path) {
                Ok((rss_pages, shared_pages)) => {
                    stats.rss_kb = rss_pages.saturating_mul(self.page_size_kb);
                    let shared_kb = shared_pages.saturating_mul(self.page_size_kb);
                    // RSS pages - shared pages = USS pages.
                    stats.uss_kb = stats.rss_kb.checked_sub(shared_kb).unwrap_or(0);
                }
                Err(e) if e.is_warn() => debug!(error = %e, "skipping statm"),
                Err(e) => return Err(e),
            }
        }

        // 4. Per-thread stats from the task directory. A task directory
        // that cannot be opened leaves a single-task process.
        let task_dir = self.task_dir(pid);
        for name in self.fs.subdirectories(&task_dir).unwrap_or_default() {
            let Ok(tid) = name.parse::<u32>() else {
                continue;
            };

            if tid != pid {
                let tid_stat_path = self.thread_stat_path(pid, tid);
                match self.read_pid_stat(&tid_stat_path) {
                    Ok(tid_stat) => {
                        stats.io_blocked_tasks_count += u64::from(tid_stat.state == 'D');
                        stats.total_tasks_count += 1;
                    }
                    Err(e) if e.is_warn() => {
                        // Thread exited before its stat was read.
                        debug!(error = %e, "skipping thread");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            if !time_in_state_enabled {
                continue;
            }

            // 5. Per-thread cycle estimate. The kernel may not expose
            // time_in_state at all, the thread may have exited, or the
            // computed total may be zero; in all of those cases the thread
            // simply gets no entry.
            let tis_path = self.time_in_state_path(pid, tid);
            match self.read_time_in_state(&tis_path) {
                Ok(cycles) if cycles > 0 => {
                    stats.total_cpu_cycles = stats.total_cpu_cycles.saturating_add(cycles);
                    stats.cpu_cycles_by_tid.insert(tid, cycles);
                }
                Ok(_) => {}
                Err(e) if e.is_warn() => {}
                Err(e) => return Err(e),
            }
        }

        Ok((uid, stats))
    }

    /// Scans every PID directory under the root path and folds the results
    /// into a UID-keyed snapshot.
    pub(crate) fn read_uid_stats(
        &self,
        time_in_state_enabled: bool,
        prev: &StatsByUid,
    ) -> Result<StatsByUid, ReadError> {
        let names = self
            .fs
            .subdirectories(&self.root)
            .map_err(|e| ReadError::parse(&self.root, format!("failed to open directory: {e}")))?;

        let mut stats_by_uid = StatsByUid::new();
        for name in names {
            let Ok(pid) = name.parse::<u32>() else {
                continue;
            };
            match self.read_process_stats(pid, time_in_state_enabled, prev) {
                Ok((uid, process_stats)) => {
                    stats_by_uid
                        .entry(uid)
                        .or_default()
                        .add_process(pid, process_stats);
                }
                Err(e) if e.is_warn() => debug!(error = %e, "skipping pid"),
                Err(e) => return Err(e),
            }
        }
        Ok(stats_by_uid)
    }
}
