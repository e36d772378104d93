#![allow(dead_code)]

use rtsync::channel::WatchRegistry;
use rtsync::{SyncOutcome, SyncTrigger, WatchHandle};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Registry that hands out handles without touching the kernel and remembers
/// which ones are active.
#[derive(Debug)]
pub struct CountingRegistry {
    next: i32,
    active: HashMap<WatchHandle, PathBuf>,
    pub removed: Vec<WatchHandle>,
}

impl CountingRegistry {
    pub fn new() -> Self {
        Self {
            next: 1,
            active: HashMap::new(),
            removed: Vec::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for CountingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchRegistry for CountingRegistry {
    fn add_watch(&mut self, path: &Path, _mask: u32) -> io::Result<WatchHandle> {
        if !path.is_dir() {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        if let Some((handle, _)) = self.active.iter().find(|(_, p)| p.as_path() == path) {
            return Ok(*handle);
        }
        let handle = WatchHandle::from_raw(self.next);
        self.next += 1;
        self.active.insert(handle, path.to_path_buf());
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        match self.active.remove(&handle) {
            Some(_) => {
                self.removed.push(handle);
                Ok(())
            }
            None => Err(io::Error::from(io::ErrorKind::InvalidInput)),
        }
    }
}

/// Sync trigger that counts its runs.
#[derive(Debug, Default)]
pub struct CountingSync {
    pub fired: usize,
}

impl SyncTrigger for CountingSync {
    fn fire(&mut self) -> SyncOutcome {
        self.fired += 1;
        SyncOutcome::Success
    }
}

/// Creates every relative directory in `dirs` below `root`.
pub fn make_dirs(root: &Path, dirs: &[&str]) -> io::Result<()> {
    for dir in dirs {
        fs::create_dir_all(root.join(dir))?;
    }
    Ok(())
}

/// All directories at or below `root`, without following symlinks.
pub fn directories_under(root: &Path) -> HashSet<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}
