use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// File name of the child.
    pub name: OsString,
    /// Whether the child is a directory. Symlinks are never reported as directories.
    pub is_dir: bool,
}

impl ChildEntry {
    /// Creates a directory entry.
    pub fn dir(name: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }

    /// Creates a non-directory entry.
    pub fn file(name: impl Into<OsString>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// Enumerates the immediate children of a directory.
pub trait DirLister {
    /// Lists `dir`, excluding `.` and `..`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the directory cannot be opened or read.
    fn list(&self, dir: &Path) -> io::Result<Vec<ChildEntry>>;
}

/// Lists directories on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl DirLister for FsLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<ChildEntry>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            // file_type() does not follow symlinks
            let is_dir = entry.file_type()?.is_dir();
            children.push(ChildEntry {
                name: entry.file_name(),
                is_dir,
            });
        }
        Ok(children)
    }
}
