#[cfg(test)]
pub mod fixtures {
    use crate::channel::{EventSource, WatchHandle, WatchRegistry, mask};
    use crate::sync::{SyncOutcome, SyncTrigger};
    use crate::tree::{ChildEntry, DirLister};
    use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
    use std::io;
    use std::path::{Path, PathBuf};

    /// In-memory watch registry that hands out increasing handles like the kernel.
    #[derive(Debug, Default)]
    pub struct FakeRegistry {
        next: i32,
        active: HashMap<WatchHandle, PathBuf>,
        missing: HashSet<PathBuf>,
        files: HashSet<PathBuf>,
    }

    impl FakeRegistry {
        pub fn new() -> Self {
            Self {
                next: 1,
                ..Default::default()
            }
        }

        pub fn active_count(&self) -> usize {
            self.active.len()
        }

        /// Makes `add_watch` fail with `NotFound` for `path`.
        pub fn mark_missing(&mut self, path: &str) {
            self.missing.insert(PathBuf::from(path));
        }

        /// Makes `path` a regular file: directory-only watches fail with `ENOTDIR`.
        pub fn mark_file(&mut self, path: &str) {
            self.files.insert(PathBuf::from(path));
        }

        /// Simulates the kernel dropping a watch (directory deleted).
        pub fn release_behind_our_back(&mut self, handle: WatchHandle) {
            self.active.remove(&handle);
        }
    }

    impl WatchRegistry for FakeRegistry {
        fn add_watch(&mut self, path: &Path, bits: u32) -> io::Result<WatchHandle> {
            if self.missing.contains(path) {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            if bits & mask::ONLYDIR != 0 && self.files.contains(path) {
                return Err(io::Error::from_raw_os_error(libc::ENOTDIR));
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
                Some(_) => Ok(()),
                None => Err(io::Error::from_raw_os_error(libc::EINVAL)),
            }
        }
    }

    /// Event source that replays scripted reads, then fails like a closed channel.
    #[derive(Debug, Default)]
    pub struct ScriptedSource {
        pub registry: FakeRegistry,
        reads: VecDeque<Vec<u8>>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self {
                registry: FakeRegistry::new(),
                reads: VecDeque::new(),
            }
        }

        pub fn push_read(&mut self, bytes: Vec<u8>) {
            self.reads.push_back(bytes);
        }
    }

    impl WatchRegistry for ScriptedSource {
        fn add_watch(&mut self, path: &Path, mask: u32) -> io::Result<WatchHandle> {
            self.registry.add_watch(path, mask)
        }

        fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
            self.registry.remove_watch(handle)
        }
    }

    impl EventSource for ScriptedSource {
        fn read_events(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(bytes) = self.reads.pop_front() else {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            };
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            Ok(n)
        }
    }

    /// In-memory directory tree.
    #[derive(Debug, Default)]
    pub struct MemLister {
        dirs: BTreeMap<PathBuf, Vec<ChildEntry>>,
        failures: HashMap<PathBuf, io::ErrorKind>,
    }

    impl MemLister {
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates `path` and links it into its parent if the parent exists.
        pub fn mkdir(&mut self, path: &str) {
            let path = PathBuf::from(path);
            self.dirs.entry(path.clone()).or_default();
            self.link(&path, true);
        }

        pub fn touch(&mut self, path: &str) {
            self.link(Path::new(path), false);
        }

        /// Removes `path` and everything below it.
        pub fn rmdir(&mut self, path: &str) {
            let path = PathBuf::from(path);
            self.dirs.retain(|p, _| !p.starts_with(&path));
            if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                if let Some(children) = self.dirs.get_mut(parent) {
                    children.retain(|c| c.name.as_os_str() != name);
                }
            }
        }

        pub fn fail_on(&mut self, path: &str, kind: io::ErrorKind) {
            self.failures.insert(PathBuf::from(path), kind);
        }

        fn link(&mut self, path: &Path, is_dir: bool) {
            if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                if let Some(children) = self.dirs.get_mut(parent) {
                    if !children.iter().any(|c| c.name.as_os_str() == name) {
                        children.push(ChildEntry {
                            name: name.to_os_string(),
                            is_dir,
                        });
                    }
                }
            }
        }
    }

    impl DirLister for MemLister {
        fn list(&self, dir: &Path) -> io::Result<Vec<ChildEntry>> {
            if let Some(kind) = self.failures.get(dir) {
                return Err(io::Error::from(*kind));
            }
            self.dirs
                .get(dir)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    /// Sync trigger that only counts how often it fired.
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
}
