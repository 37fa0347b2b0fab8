//! Virtual filesystem.
//!
//! Module loading goes through the [`Fs`] trait so compilations can run
//! against the real filesystem ([`OsFs`]) or an in-memory snapshot
//! ([`MemFs`]) in tests. Paths are `/`-separated strings on every
//! implementation.

use std::fmt::Debug;

use indexmap::{IndexMap, IndexSet};

/// Filesystem operation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FsError {
    /// The path does not exist
    #[error("'{0}' not found")]
    NotFound(String),
    /// Any other I/O failure
    #[error("i/o error: {0}")]
    Io(String),
}

/// Metadata of one filesystem entry
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Size in bytes; zero for directories
    pub size: u64,
}

/// The virtual filesystem interface.
pub trait Fs: Debug {
    /// An identifier for this filesystem (`file://`, `mem://`)
    fn uri(&self) -> String;

    /// Returns metadata for a path
    fn stat(&self, path: &str) -> Result<FileInfo, FsError>;

    /// Reads a file as UTF-8 text
    fn read_file(&self, path: &str) -> Result<String, FsError>;

    /// Writes a file, creating it if needed
    fn write_file(&mut self, path: &str, content: &str) -> Result<(), FsError>;

    /// Creates a directory
    fn mkdir(&mut self, path: &str) -> Result<(), FsError>;

    /// Returns every file path under a directory, sorted
    fn walk(&self, path: &str) -> Result<Vec<String>, FsError>;
}

/// An in-memory filesystem for tests and module snapshots.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: IndexMap<String, String>,
    dirs: IndexSet<String>,
}

impl MemFs {
    /// Creates an empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filesystem from (path, content) pairs
    pub fn snapshot<I, P, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let mut fs = Self::new();
        for (path, content) in entries {
            fs.write_file(&path.into(), &content.into()).expect("memory writes cannot fail");
        }
        fs
    }

    fn register_parents(&mut self, path: &str) {
        let mut dir = path;
        while let Some(index) = dir.rfind('/') {
            dir = &dir[..index];
            if dir.is_empty() {
                break;
            }
            self.dirs.insert(dir.to_string());
        }
    }
}

impl Fs for MemFs {
    fn uri(&self) -> String {
        "mem://".to_string()
    }

    fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        if let Some(content) = self.files.get(path) {
            return Ok(FileInfo { is_dir: false, size: content.len() as u64 });
        }
        if self.dirs.contains(path) {
            return Ok(FileInfo { is_dir: true, size: 0 });
        }
        Err(FsError::NotFound(path.to_string()))
    }

    fn read_file(&self, path: &str) -> Result<String, FsError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<(), FsError> {
        self.register_parents(path);
        self.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), FsError> {
        self.register_parents(path);
        self.dirs.insert(path.to_string());
        Ok(())
    }

    fn walk(&self, path: &str) -> Result<Vec<String>, FsError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut out: Vec<String> = self
            .files
            .keys()
            .filter(|file| file.starts_with(&prefix))
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }
}

/// The real filesystem.
#[derive(Debug, Clone, Default)]
pub struct OsFs;

impl Fs for OsFs {
    fn uri(&self) -> String {
        "file://".to_string()
    }

    fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        let meta = std::fs::metadata(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            _ => FsError::Io(error.to_string()),
        })?;
        Ok(FileInfo { is_dir: meta.is_dir(), size: meta.len() })
    }

    fn read_file(&self, path: &str) -> Result<String, FsError> {
        std::fs::read_to_string(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            _ => FsError::Io(error.to_string()),
        })
    }

    fn write_file(&mut self, path: &str, content: &str) -> Result<(), FsError> {
        std::fs::write(path, content).map_err(|error| FsError::Io(error.to_string()))
    }

    fn mkdir(&mut self, path: &str) -> Result<(), FsError> {
        std::fs::create_dir_all(path).map_err(|error| FsError::Io(error.to_string()))
    }

    fn walk(&self, path: &str) -> Result<Vec<String>, FsError> {
        fn visit(dir: &std::path::Path, out: &mut Vec<String>) -> std::io::Result<()> {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    visit(&path, out)?;
                } else {
                    out.push(path.to_string_lossy().to_string());
                }
            }
            Ok(())
        }

        let mut out = Vec::new();
        visit(std::path::Path::new(path), &mut out).map_err(|error| FsError::Io(error.to_string()))?;
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_fs_round_trips() {
        let mut fs = MemFs::new();
        fs.write_file("mod/main.rill", "$a = 1").unwrap();

        assert_eq!(fs.read_file("mod/main.rill").unwrap(), "$a = 1");
        assert!(fs.stat("mod/main.rill").unwrap().is_dir == false);
        assert!(fs.stat("mod").unwrap().is_dir);
        assert!(matches!(fs.read_file("missing"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn mem_fs_walk_lists_files_sorted() {
        let fs = MemFs::snapshot([
            ("mod/b.rill", "$b = 2"),
            ("mod/a.rill", "$a = 1"),
            ("other/c.rill", "$c = 3"),
        ]);
        assert_eq!(fs.walk("mod").unwrap(), vec!["mod/a.rill".to_string(), "mod/b.rill".to_string()]);
    }
}
