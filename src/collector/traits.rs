//! Filesystem seam between the collector and `/proc`.
//!
//! A stats collection touches the filesystem in exactly two ways: it slurps
//! small procfs files whole, and it enumerates the PID/TID subdirectories of
//! a scan root. The `FileSystem` trait exposes only those two operations, so
//! tests can substitute an in-memory fixture tree without carrying a general
//! filesystem API around.

use std::io;
use std::path::Path;

/// The filesystem operations a stats collection performs.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Returns the names of the directory entries of `path` that are
    /// themselves directories.
    ///
    /// This is the only directory view a PID/TID scan needs: candidate
    /// entries are subdirectories with numeric names, and everything else
    /// (files, symlinks like `/proc/self`, non-numeric names) is skipped.
    /// Symlinks are not followed, matching the entry-type check of a native
    /// directory walk.
    fn subdirectories(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
///
/// Use this in production to read from the actual `/proc` filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            // Entries can vanish between the readdir and the type lookup;
            // a vanished entry is simply not a candidate.
            let Ok(entry) = entry else {
                continue;
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }
}
