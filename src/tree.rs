//! # Watch tree
//!
//! Bidirectional map between active watch handles and the directories they watch.
//!
//! The tree is seeded by walking the root recursively and then kept in step with
//! the filesystem as directories appear and disappear:
//!
//! - a directory created in, or moved into, the tree is walked and every directory
//!   below it gets a watch ([`WatchTree::register_subtree`]);
//! - a directory moved out of the tree loses its watch together with every
//!   descendant watch ([`WatchTree::unregister_subtree`]);
//! - a deleted directory is dropped the same way, except that the kernel already
//!   released its watches, so they are only forgotten ([`WatchTree::forget_subtree`]).
//!
//! Paths are matched component-wise: removing `/a/b` never touches `/a/bc`.
//!
//! A new directory's path is built from its parent's stored path. Stored paths are
//! not rewritten when an ancestor is renamed without an event reaching the tree
//! (for instance the root itself).

use crate::channel::{WATCH_MASK, WatchHandle, WatchRegistry, mask};
use crate::error::{Result, WatchError};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, span, warn};

/// Directory enumeration.
pub mod lister;

pub use lister::{ChildEntry, DirLister, FsLister};

/// Mapping between watch handles and absolute directory paths.
#[derive(Debug)]
pub struct WatchTree<L = FsLister> {
    /// Directory enumeration used by the recursive walk.
    lister: L,
    /// Mask installed on every watch, including the directory-only flag.
    mask: u32,
    /// Handle to path.
    paths: HashMap<WatchHandle, PathBuf>,
    /// Path to handle.
    handles: HashMap<PathBuf, WatchHandle>,
}

impl WatchTree<FsLister> {
    /// Creates an empty tree that walks the local filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lister(FsLister)
    }
}

impl Default for WatchTree<FsLister> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: DirLister> WatchTree<L> {
    /// Creates an empty tree using a custom directory lister.
    pub fn with_lister(lister: L) -> Self {
        Self {
            lister,
            mask: WATCH_MASK | mask::ONLYDIR,
            paths: HashMap::new(),
            handles: HashMap::new(),
        }
    }

    /// Watches `root` and every directory below it.
    ///
    /// Returns the number of new entries.
    ///
    /// # Errors
    ///
    /// Fails with [`WatchError::Io`] if the root cannot be watched or listed, or if
    /// any directory below it fails to be read. A subdirectory that disappears during
    /// the walk is skipped.
    pub fn register_root<R: WatchRegistry>(
        &mut self,
        registry: &mut R,
        root: &Path,
    ) -> Result<usize> {
        let span = span!(Level::DEBUG, "register_root", root = %root.display());
        let _guard = span.enter();

        self.walk(registry, root, true)
    }

    /// Watches a directory that appeared under the tree, and everything below it.
    ///
    /// Existing entries are kept. A directory that vanished before it could be
    /// watched is skipped with a warning.
    ///
    /// # Errors
    ///
    /// Fails with [`WatchError::Io`] on any other watch or read failure.
    pub fn register_subtree<R: WatchRegistry>(
        &mut self,
        registry: &mut R,
        dir: &Path,
    ) -> Result<usize> {
        let span = span!(Level::DEBUG, "register_subtree", dir = %dir.display());
        let _guard = span.enter();

        self.walk(registry, dir, false)
    }

    /// Releases the watch of `prefix` and of every directory below it.
    ///
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Fails with [`WatchError::Consistency`] if the OS rejects the removal of a
    /// handle the tree still holds.
    pub fn unregister_subtree<R: WatchRegistry>(
        &mut self,
        registry: &mut R,
        prefix: &Path,
    ) -> Result<usize> {
        self.drain_subtree(prefix, |handle, path| {
            registry
                .remove_watch(handle)
                .map_err(|source| WatchError::Consistency {
                    handle,
                    path: path.to_path_buf(),
                    source,
                })
        })
    }

    /// Drops the entries of `prefix` and everything below it without touching the
    /// OS. Used when the kernel already released the watches.
    pub fn forget_subtree(&mut self, prefix: &Path) -> usize {
        self.drain_subtree(prefix, |_, _| Ok(())).unwrap_or_default()
    }

    /// Drops a single entry whose watch the kernel released.
    pub fn forget(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        let path = self.paths.remove(&handle)?;
        self.handles.remove(&path);
        debug!(%handle, path = %path.display(), "watch released by kernel");
        Some(path)
    }

    /// Path watched by `handle`, or `None` if the handle is not (or no longer) tracked.
    #[must_use]
    pub fn resolve(&self, handle: WatchHandle) -> Option<&Path> {
        self.paths.get(&handle).map(PathBuf::as_path)
    }

    /// Path of child `name` inside the directory watched by `handle`.
    #[must_use]
    pub fn child_path(&self, handle: WatchHandle, name: &OsStr) -> Option<PathBuf> {
        self.resolve(handle).map(|dir| dir.join(name))
    }

    /// Handle watching `path`.
    #[must_use]
    pub fn handle_of(&self, path: &Path) -> Option<WatchHandle> {
        self.handles.get(path).copied()
    }

    /// Whether `path` is watched.
    #[must_use]
    pub fn contains_path(&self, path: &Path) -> bool {
        self.handles.contains_key(path)
    }

    /// Number of watched directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterates over all entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (WatchHandle, &Path)> {
        self.paths.iter().map(|(h, p)| (*h, p.as_path()))
    }

    #[cfg(test)]
    pub(crate) fn lister_mut(&mut self) -> &mut L {
        &mut self.lister
    }

    /// Depth-first walk with an explicit stack.
    fn walk<R: WatchRegistry>(
        &mut self,
        registry: &mut R,
        top: &Path,
        strict: bool,
    ) -> Result<usize> {
        let mut pending = vec![top.to_path_buf()];
        let mut added = 0;

        while let Some(dir) = pending.pop() {
            // Only the root of register_root must exist; anything else may have
            // been removed, or replaced by a file, before we got to it.
            let must_exist = strict && dir == top;

            let handle = match registry.add_watch(&dir, self.mask) {
                Ok(handle) => handle,
                Err(e) if vanished(&e) && !must_exist => {
                    warn!(dir = %dir.display(), "directory vanished before it could be watched");
                    continue;
                }
                Err(e) => return Err(watch_failure(&dir, e)),
            };

            if self.insert(handle, dir.clone()) {
                added += 1;
            }

            let children = match self.lister.list(&dir) {
                Ok(children) => children,
                Err(e) if vanished(&e) && !must_exist => {
                    warn!(dir = %dir.display(), "directory vanished while being listed");
                    continue;
                }
                Err(e) => {
                    return Err(WatchError::io(
                        format!("failed to read directory {}", dir.display()),
                        e,
                    ));
                }
            };

            pending.extend(
                children
                    .into_iter()
                    .filter(|child| child.is_dir)
                    .map(|child| dir.join(child.name)),
            );
        }

        debug!(top = %top.display(), added, total = self.len(), "subtree registered");
        Ok(added)
    }

    /// Records `handle -> path`, keeping both maps one-to-one.
    ///
    /// Returns `false` if the exact entry already existed.
    fn insert(&mut self, handle: WatchHandle, path: PathBuf) -> bool {
        if self.paths.get(&handle) == Some(&path) {
            return false;
        }

        if let Some(old_path) = self.paths.insert(handle, path.clone()) {
            debug!(
                %handle,
                old = %old_path.display(),
                new = %path.display(),
                "handle re-registered"
            );
            self.handles.remove(&old_path);
        }
        if let Some(old_handle) = self.handles.insert(path, handle) {
            if old_handle != handle {
                self.paths.remove(&old_handle);
            }
        }
        true
    }

    /// Removes `handle` from both maps.
    fn remove_entry(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        let path = self.paths.remove(&handle)?;
        self.handles.remove(&path);
        Some(path)
    }

    /// Removes every entry at or below `prefix`, calling `release` for each one
    /// before it is dropped. Scans until a full pass finds nothing left.
    fn drain_subtree<F>(&mut self, prefix: &Path, mut release: F) -> Result<usize>
    where
        F: FnMut(WatchHandle, &Path) -> Result<()>,
    {
        let span = span!(Level::DEBUG, "drain_subtree", prefix = %prefix.display());
        let _guard = span.enter();

        let mut removed = 0;
        loop {
            let matches: Vec<WatchHandle> = self
                .paths
                .iter()
                .filter(|(_, path)| path.starts_with(prefix))
                .map(|(handle, _)| *handle)
                .collect();

            if matches.is_empty() {
                break;
            }

            for handle in matches {
                if let Some(path) = self.paths.get(&handle) {
                    release(handle, path)?;
                }
                if let Some(path) = self.remove_entry(handle) {
                    debug!(%handle, path = %path.display(), "watch entry removed");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// The path is gone or no longer a directory.
fn vanished(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Builds the error for a failed watch registration.
fn watch_failure(dir: &Path, err: io::Error) -> WatchError {
    let context = if err.raw_os_error() == Some(libc::ENOSPC) {
        format!(
            "watch limit reached while watching {} (raise fs.inotify.max_user_watches)",
            dir.display()
        )
    } else {
        format!("failed to watch {}", dir.display())
    };
    WatchError::io(context, err)
}
