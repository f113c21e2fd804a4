//! uidstats — per-UID process statistics collection for Linux.
//!
//! Scans a `/proc`-style filesystem, folds per-process and per-thread kernel
//! counters under the owning user id, and keeps two views of the result: the
//! latest absolute snapshot and the delta since the previous collection.
//! Resource-monitoring surfaces use the deltas to spot CPU, memory, and I/O
//! overuse without caring about the process churn underneath.
//!
//! Provides:
//! - `collector` — procfs scanning, per-UID aggregation, delta computation
//! - `model` — serializable snapshot data model
//!
//! ```
//! use uidstats::collector::{MockFs, UidProcStatsCollector};
//!
//! let fs = MockFs::typical_system();
//! let collector = UidProcStatsCollector::new(fs, "/proc", false);
//! collector.init();
//! collector.collect().unwrap();
//! let latest = collector.latest_stats();
//! assert!(!latest.is_empty());
//! ```

pub mod collector;
pub mod model;
