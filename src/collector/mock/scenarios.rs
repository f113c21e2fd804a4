//! Pre-built mock filesystem scenarios and `/proc` content builders.
//!
//! The builders synthesize realistic `stat`, `status`, `statm` and
//! `time_in_state` contents so tests state their inputs in terms of the
//! counters they care about instead of raw procfs lines.

use super::filesystem::MockFs;

/// Synthesizes one `/proc/[pid]/stat` line.
///
/// Field layout follows the kernel format; only the fields the collector
/// consumes (state, major faults, utime, stime, starttime) are
/// parameterized, the rest carry fixed plausible values. Times are in clock
/// ticks.
pub fn stat_line(
    pid: u32,
    comm: &str,
    state: char,
    major_faults: u64,
    utime: u64,
    stime: u64,
    start_time: u64,
) -> String {
    format!(
        "{pid} ({comm}) {state} 0 {pid} {pid} 0 -1 4194560 1500 0 {major_faults} 0 \
         {utime} {stime} 0 0 10 -10 1 0 {start_time} 1000000 100 18446744073709551615"
    )
}

/// Synthesizes `/proc/[pid]/status` contents with the given Tgid and Uid.
pub fn status_content(pid: u32, uid: u32, tgid: u32) -> String {
    format!(
        "Name:\tmockproc\n\
         Umask:\t0000\n\
         State:\tS (sleeping)\n\
         Tgid:\t{tgid}\n\
         Ngid:\t0\n\
         Pid:\t{pid}\n\
         PPid:\t0\n\
         TracerPid:\t0\n\
         Uid:\t{uid}\t{uid}\t{uid}\t{uid}\n\
         Gid:\t{uid}\t{uid}\t{uid}\t{uid}\n\
         FDSize:\t64\n"
    )
}

/// Synthesizes `/proc/[pid]/task/[tid]/time_in_state` contents with a single
/// frequency policy. Entries are `(freq_khz, clock_ticks)` pairs.
pub fn time_in_state_content(entries: &[(u64, u64)]) -> String {
    let mut content = String::from("cpu0\n");
    for (freq_khz, ticks) in entries {
        content.push_str(&format!("{freq_khz} {ticks}\n"));
    }
    content
}

impl MockFs {
    /// Adds a process with its `stat`, `status` and main-thread task entry
    /// under `/proc/<pid>`.
    pub fn add_process(&mut self, pid: u32, uid: u32, stat: &str) {
        let base = format!("/proc/{pid}");
        self.add_dir(&base);
        self.add_file(format!("{base}/stat"), stat);
        self.add_file(format!("{base}/status"), status_content(pid, uid, pid));
        self.add_dir(format!("{base}/task/{pid}"));
        self.add_file(format!("{base}/task/{pid}/stat"), stat);
    }

    /// Adds a thread entry under `/proc/<pid>/task/<tid>`.
    pub fn add_thread(&mut self, pid: u32, tid: u32, stat: &str) {
        let base = format!("/proc/{pid}/task/{tid}");
        self.add_dir(&base);
        self.add_file(format!("{base}/stat"), stat);
    }

    /// Adds a `time_in_state` file for one thread.
    pub fn add_time_in_state(&mut self, pid: u32, tid: u32, content: &str) {
        self.add_file(format!("/proc/{pid}/task/{tid}/time_in_state"), content);
    }

    /// Adds a `statm` file for one process.
    pub fn add_statm(&mut self, pid: u32, content: &str) {
        self.add_file(format!("/proc/{pid}/statm"), content);
    }

    /// Creates a small but complete system.
    ///
    /// Includes: init (PID 1, UID 0), a multi-threaded "system server"
    /// (PID 1000, UID 1000) with one thread in uninterruptible sleep, and a
    /// single-threaded logger (PID 2000, UID 1000). All threads have
    /// `time_in_state` files, so the capability probe enables cycle
    /// collection.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_process(1, 0, &stat_line(1, "init", 'S', 220, 10, 10, 2));
        fs.add_time_in_state(1, 1, &time_in_state_content(&[(300_000, 100), (600_000, 40)]));
        fs.add_statm(1, "2969783 1481 938 530 0 5067 0\n");

        fs.add_process(1000, 1000, &stat_line(1000, "system server", 'S', 600, 100, 50, 1000));
        fs.add_thread(1000, 1001, &stat_line(1001, "binder:1000_1", 'S', 0, 20, 10, 1010));
        fs.add_thread(1000, 1002, &stat_line(1002, "io worker", 'D', 0, 5, 5, 1020));
        fs.add_time_in_state(1000, 1000, &time_in_state_content(&[(1_000_000, 50)]));
        fs.add_time_in_state(1000, 1001, &time_in_state_content(&[(1_000_000, 20)]));
        fs.add_time_in_state(1000, 1002, &time_in_state_content(&[(500_000, 10)]));
        fs.add_statm(1000, "500000 3000 1000 200 0 4000 0\n");

        fs.add_process(2000, 1000, &stat_line(2000, "logger", 'S', 15, 30, 10, 2000));
        fs.add_time_in_state(2000, 2000, &time_in_state_content(&[(300_000, 30)]));
        fs.add_statm(2000, "10000 500 100 50 0 300 0\n");

        fs
    }

    /// Creates a system with init plus exactly one user process: PID 1000
    /// owned by UID 42, one thread, `utime=10 stime=20 starttime=500`
    /// clock ticks and 7 major faults.
    pub fn single_process_system() -> Self {
        let mut fs = Self::new();
        fs.add_process(1, 0, &stat_line(1, "init", 'S', 220, 10, 10, 2));
        fs.add_time_in_state(1, 1, &time_in_state_content(&[(300_000, 100)]));
        fs.add_statm(1, "2969783 1481 938 530 0 5067 0\n");

        fs.add_process(1000, 42, &stat_line(1000, "vehicle app", 'S', 7, 10, 20, 500));
        fs.add_time_in_state(1000, 1000, &time_in_state_content(&[(300_000, 10)]));
        fs.add_statm(1000, "40000 2000 500 100 0 1500 0\n");
        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::FileSystem;
    use std::path::Path;

    #[test]
    fn test_stat_line_layout() {
        let line = stat_line(1000, "vehicle app", 'S', 7, 10, 20, 500);
        assert!(line.starts_with("1000 (vehicle app) S "));
        let after_comm: Vec<&str> = line.split(") ").nth(1).unwrap().split(' ').collect();
        assert_eq!(after_comm[0], "S");
        assert_eq!(after_comm[9], "7"); // major faults
        assert_eq!(after_comm[11], "10"); // utime
        assert_eq!(after_comm[12], "20"); // stime
        assert_eq!(after_comm[19], "500"); // starttime
    }

    #[test]
    fn test_typical_system_layout() {
        let fs = MockFs::typical_system();
        assert!(fs.read_to_string(Path::new("/proc/1/stat")).is_ok());
        assert!(fs.read_to_string(Path::new("/proc/1/task/1/stat")).is_ok());
        assert!(
            fs.read_to_string(Path::new("/proc/1000/task/1002/time_in_state"))
                .is_ok()
        );

        let mut pids = fs.subdirectories(Path::new("/proc")).unwrap();
        pids.sort();
        assert_eq!(pids, ["1", "1000", "2000"]);

        let mut tids = fs.subdirectories(Path::new("/proc/1000/task")).unwrap();
        tids.sort();
        assert_eq!(tids, ["1000", "1001", "1002"]);
    }
}
