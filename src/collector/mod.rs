//! Per-UID process statistics collection from a `/proc`-style filesystem.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   UidProcStatsCollector                      │
//! │  init() probe · collect() · latest_stats() / delta_stats()   │
//! │        │                                                     │
//! │  ┌─────▼──────────┐    ┌──────────────┐   ┌──────────────┐   │
//! │  │ ProcessReader  │───▶│ procfs parser │   │ delta        │   │
//! │  │ per-PID + UID  │    │ stat/status/  │   │ snapshot     │   │
//! │  │ aggregation    │    │ time_in_state │   │ diffing      │   │
//! │  └─────┬──────────┘    │ /statm        │   └──────────────┘   │
//! │        │               └──────────────┘                      │
//! │  ┌─────▼──────┐                                              │
//! │  │ FileSystem │ (trait)          SmapsRollup (trait) ────────┼──▶ external
//! │  └─────┬──────┘                                              │    collaborator
//! └────────┼─────────────────────────────────────────────────────┘
//!          │
//!   ┌──────┴──────┐
//!   │             │
//! RealFs        MockFs (testing fixtures)
//! ```
//!
//! Every `collect()` scans the PID directories under the configured root,
//! assembles a [`crate::model::ProcessStats`] per process leader from its
//! `stat`, `status`, memory and task files, folds the results into a
//! UID-keyed snapshot, and diffs it against the previous snapshot. PIDs and
//! TIDs that vanish mid-scan are skipped; malformed files abort the
//! collection without publishing a partial snapshot.

#[allow(clippy::module_inception)]
mod collector;
mod delta;
pub mod mock;
pub mod procfs;
pub mod smaps;
pub mod traits;

pub use collector::{CollectError, UidProcStatsCollector};
pub use mock::MockFs;
pub use procfs::{ParseError, PidStat, ReadError};
pub use smaps::{MemoryUsage, NoSmapsRollup, SmapsRollup};
pub use traits::{FileSystem, RealFs};
