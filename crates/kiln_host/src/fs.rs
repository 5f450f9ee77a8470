//! Filesystem backends: the real disk and an in-memory map for tests and
//! embedders.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The filesystem operations a [`ProgramHost`](crate::ProgramHost) needs.
pub trait FileSystem: Send + Sync {
    /// Reads a file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Returns `true` if a regular file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Writes `contents` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The operating system's filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileSystem;

impl FileSystem for DiskFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)
    }
}

/// A filesystem held entirely in memory, keyed by absolute path.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
}

impl MemoryFileSystem {
    /// Creates an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filesystem pre-populated with text files.
    pub fn with_files<P, S>(files: impl IntoIterator<Item = (P, S)>) -> Self
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let fs = Self::new();
        for (path, text) in files {
            fs.insert(path, text);
        }
        fs
    }

    /// Adds or replaces a text file.
    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.into(), text.into().into_bytes());
    }

    /// Removes a file, returning `true` if it existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.files.lock().unwrap().remove(path).is_some()
    }

    /// Returns a file's contents as text, if present.
    pub fn get_text(&self, path: &Path) -> Option<String> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Returns all stored paths in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let files = self.files.lock().unwrap();
        let bytes = files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })?;
        String::from_utf8(bytes.clone()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }
}
