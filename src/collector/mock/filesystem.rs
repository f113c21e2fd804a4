//! In-memory mock filesystem for testing the collector without a real `/proc`.

use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// One entry in the fixture tree.
#[derive(Debug, Clone)]
enum Node {
    File(String),
    Dir,
}

/// In-memory filesystem for testing.
///
/// Holds the fixture tree as a single path-to-node map, which makes it
/// trivial to simulate `/proc` states that are impossible to hold still on
/// a live system, like a PID directory whose files vanished mid-scan.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    nodes: HashMap<PathBuf, Node>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if p.as_os_str().is_empty() {
                break;
            }
            self.nodes.entry(p.to_path_buf()).or_insert(Node::Dir);
            parent = p.parent();
        }
    }

    /// Adds a file with the given content, creating parent directories.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref();
        self.ensure_parents(path);
        self.nodes.insert(path.to_path_buf(), Node::File(content.into()));
    }

    /// Adds an empty directory, creating parent directories.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.ensure_parents(path);
        self.nodes.insert(path.to_path_buf(), Node::Dir);
    }

    /// Removes a file, simulating a process or thread exiting mid-scan
    /// while its directory is still listed.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        if matches!(self.nodes.get(path.as_ref()), Some(Node::File(_))) {
            self.nodes.remove(path.as_ref());
        }
    }

    /// Removes a directory and everything under it.
    pub fn remove_tree(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes.retain(|node_path, _| !node_path.starts_with(path));
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.nodes.get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {path:?}"),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {path:?}"),
            )),
        }
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<String>> {
        if !matches!(self.nodes.get(path), Some(Node::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {path:?}"),
            ));
        }
        let mut names = Vec::new();
        for (node_path, node) in &self.nodes {
            if matches!(node, Node::Dir)
                && node_path.parent().is_some_and(|parent| parent == path)
                && let Some(name) = node_path.file_name().and_then(|name| name.to_str())
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// Shared handle over a [`MockFs`] so tests can mutate the fixture between
/// collections while the collector keeps its own clone of the handle.
pub type SharedMockFs = Arc<RwLock<MockFs>>;

impl FileSystem for SharedMockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .read_to_string(path)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<String>> {
        self.read()
            .unwrap_or_else(PoisonError::into_inner)
            .subdirectories(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_file_creates_parent_dirs() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1000/task/1000/stat", "1000 (app) S\n");

        let content = fs.read_to_string(Path::new("/proc/1000/task/1000/stat")).unwrap();
        assert_eq!(content, "1000 (app) S\n");
        // Every ancestor became a listable directory.
        assert_eq!(fs.subdirectories(Path::new("/proc")).unwrap(), ["1000"]);
        assert_eq!(fs.subdirectories(Path::new("/proc/1000/task")).unwrap(), ["1000"]);
    }

    #[test]
    fn test_subdirectories_lists_only_directories() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1/stat", "a");
        fs.add_dir("/proc/2");
        fs.add_file("/proc/version", "Linux\n");

        let mut names = fs.subdirectories(Path::new("/proc")).unwrap();
        names.sort();
        // The `version` file is not a scan candidate; the `1` and `2`
        // directories are.
        assert_eq!(names, ["1", "2"]);
    }

    #[test]
    fn test_read_errors() {
        let mut fs = MockFs::new();
        fs.add_dir("/proc/1");

        let missing = fs.read_to_string(Path::new("/proc/1/stat")).unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);

        // Reading a directory as a file fails, like the real procfs.
        assert!(fs.read_to_string(Path::new("/proc/1")).is_err());

        let no_dir = fs.subdirectories(Path::new("/sys")).unwrap_err();
        assert_eq!(no_dir.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_file_leaves_directory_listed() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1000/stat", "a");
        fs.remove_file("/proc/1000/stat");

        // The PID directory is still enumerated; only its file is gone.
        assert_eq!(fs.subdirectories(Path::new("/proc")).unwrap(), ["1000"]);
        assert!(fs.read_to_string(Path::new("/proc/1000/stat")).is_err());
    }

    #[test]
    fn test_remove_tree() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1000/stat", "a");
        fs.add_file("/proc/1000/task/1000/stat", "b");
        fs.add_file("/proc/2000/stat", "c");

        fs.remove_tree("/proc/1000");

        assert_eq!(fs.subdirectories(Path::new("/proc")).unwrap(), ["2000"]);
        assert!(fs.read_to_string(Path::new("/proc/1000/task/1000/stat")).is_err());
        assert!(fs.read_to_string(Path::new("/proc/2000/stat")).is_ok());
    }

    #[test]
    fn test_shared_mock_fs_mutation_is_visible() {
        let shared: SharedMockFs = Arc::new(RwLock::new(MockFs::new()));
        let handle = Arc::clone(&shared);

        shared.write().unwrap().add_file("/proc/1/stat", "first");
        assert_eq!(handle.read_to_string(Path::new("/proc/1/stat")).unwrap(), "first");

        shared.write().unwrap().add_file("/proc/1/stat", "second");
        assert_eq!(handle.read_to_string(Path::new("/proc/1/stat")).unwrap(), "second");
    }
}
