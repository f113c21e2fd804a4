//! Readers for per-process `/proc` files.
//!
//! `parser` holds the pure content parsers; `process` reads the files and
//! assembles per-PID and per-UID stats. Failures at this layer carry the
//! offending path and split into two severities, which callers dispatch on:
//! a vanished file is survivable, a malformed one is not.

pub mod parser;
pub(crate) mod process;

pub use parser::{ParseError, PidStat};

use std::path::{Path, PathBuf};

/// A failed procfs read, classified by severity.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// The PID/TID directory or file disappeared between scanning and
    /// reading. This is the dominant, expected race; the affected entry is
    /// skipped and collection continues.
    Warn(PathBuf, String),
    /// The file was readable but its contents did not match the expected
    /// format. Fatal to the current collection.
    Parse(PathBuf, String),
}

impl ReadError {
    pub(crate) fn warn(path: &Path, message: impl Into<String>) -> Self {
        Self::Warn(path.to_path_buf(), message.into())
    }

    pub(crate) fn parse(path: &Path, message: impl Into<String>) -> Self {
        Self::Parse(path.to_path_buf(), message.into())
    }

    /// True for the survivable "entry vanished mid-scan" case.
    pub fn is_warn(&self) -> bool {
        matches!(self, Self::Warn(..))
    }

    /// The path of the file or directory the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Warn(path, _) | Self::Parse(path, _) => path,
        }
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warn(path, message) => {
                write!(f, "failed to read {}: {message}", path.display())
            }
            Self::Parse(path, message) => {
                write!(f, "failed to parse {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for ReadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_severity_and_path() {
        let warn = ReadError::warn(Path::new("/proc/1/stat"), "gone");
        let parse = ReadError::parse(Path::new("/proc/1/stat"), "garbage");

        assert!(warn.is_warn());
        assert!(!parse.is_warn());
        assert_eq!(warn.path(), Path::new("/proc/1/stat"));
        assert!(warn.to_string().contains("failed to read /proc/1/stat"));
        assert!(parse.to_string().contains("failed to parse /proc/1/stat"));
    }
}
