//! # Watch loop
//!
//! Drives the whole watcher:
//!
//! ```text
//!   cold-start sync
//!         │
//!         ▼
//!  ┌─► READING ──► DECODING ──► DISPATCHING ──► sync ─┐
//!  └──────────────────────────────────────────────────┘
//! ```
//!
//! One read is one batch: every event decoded from it is dispatched in delivery
//! order, then the sync command runs once. Read failures end the loop; the caller
//! drops the loop, which closes the event source.
//!
//! Dispatching keeps the [`WatchTree`] in step with the filesystem. Events for
//! handles the tree no longer knows are dropped: a cascading removal can release a
//! handle while events for it are still queued in the same or a later batch.

use crate::channel::{EventSource, WatchRegistry};
use crate::decoder::{EventDecoder, EventKind, RawEvent};
use crate::error::{Result, WatchError};
use crate::output;
use crate::sync::SyncTrigger;
use crate::tree::{DirLister, FsLister, WatchTree};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, info, span, trace, warn};

/// Counters for one dispatched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Events decoded from the read.
    pub events: usize,
    /// Events dropped because their handle is no longer tracked.
    pub stale: usize,
    /// Watch entries added.
    pub added: usize,
    /// Watch entries removed by cascading removal.
    pub removed: usize,
    /// Watches the kernel reported as released.
    pub released: usize,
    /// Queue overflow notifications seen.
    pub overflows: usize,
    /// Bytes of an incomplete record carried into the next read.
    pub carried: usize,
}

/// What dispatching a single event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No watch-tree change; only relevant for the sync.
    Passed,
    /// The handle is unknown; the event was dropped.
    Stale,
    /// A subtree was registered with this many new entries.
    Added(usize),
    /// A subtree was removed with this many entries.
    Removed(usize),
    /// The kernel released the watch; its entry was dropped.
    Released,
    /// The kernel queue overflowed; rescanning the root added this many
    /// directories the lost events would have announced.
    Overflow(usize),
}

/// Single-threaded watcher composing event source, decoder, tree and sync trigger.
#[derive(Debug)]
pub struct WatchLoop<S, T, L = FsLister> {
    /// Notification channel, also used to install and release watches.
    source: S,
    /// Handle to path mapping.
    tree: WatchTree<L>,
    /// Working buffer and fragment carry.
    decoder: EventDecoder,
    /// External synchronization.
    sync: T,
    /// Root of the watched tree, once registered.
    root: Option<PathBuf>,
}

impl<S, T, L> WatchLoop<S, T, L>
where
    S: EventSource + WatchRegistry,
    T: SyncTrigger,
    L: DirLister,
{
    /// Assembles a loop around an (usually empty) tree with a read buffer of
    /// `buffer_size` bytes.
    pub fn new(source: S, tree: WatchTree<L>, sync: T, buffer_size: usize) -> Self {
        Self {
            source,
            tree,
            decoder: EventDecoder::new(buffer_size),
            sync,
            root: None,
        }
    }

    /// Recursively watches `root`. Returns the number of watched directories.
    ///
    /// # Errors
    ///
    /// Propagates [`WatchTree::register_root`] failures.
    pub fn watch_root(&mut self, root: &Path) -> Result<usize> {
        self.tree.register_root(&mut self.source, root)?;
        self.root = Some(root.to_path_buf());
        info!(root = %root.display(), directories = self.tree.len(), "watching tree");
        Ok(self.tree.len())
    }

    /// Runs the cold-start sync, then reads, dispatches and syncs forever.
    ///
    /// # Errors
    ///
    /// Only returns on a fatal error: a failed read, a rejected watch removal or a
    /// failed registration.
    pub fn run(&mut self) -> Result<()> {
        let span = span!(Level::INFO, "watch_loop", root = ?self.root);
        let _guard = span.enter();

        debug!("cold-start sync");
        output::info("Running initial sync");
        self.sync.fire();

        loop {
            let stats = self.step()?;
            debug!(?stats, watched = self.tree.len(), "batch dispatched");
        }
    }

    /// Performs one READING → DECODING → DISPATCHING → sync cycle.
    ///
    /// # Errors
    ///
    /// Fails if the read fails or the source is closed, if a pending record can
    /// never fit in the buffer, or if dispatching hits a fatal tree error.
    pub fn step(&mut self) -> Result<BatchStats> {
        let spare = self.decoder.spare_mut();
        if spare.is_empty() {
            return Err(WatchError::io(
                format!(
                    "event record does not fit in the {}-byte read buffer",
                    self.decoder.capacity()
                ),
                io::Error::from(io::ErrorKind::InvalidData),
            ));
        }

        let read = self
            .source
            .read_events(spare)
            .map_err(|e| WatchError::io("failed to read events", e))?;
        if read == 0 {
            return Err(WatchError::io(
                "event source closed",
                io::Error::from(io::ErrorKind::UnexpectedEof),
            ));
        }
        trace!(read, carried = self.decoder.carried(), "events read");

        let stats = self.process(read)?;
        self.sync.fire();
        Ok(stats)
    }

    /// Decodes `read` new bytes and dispatches every complete event.
    fn process(&mut self, read: usize) -> Result<BatchStats> {
        let mut stats = BatchStats::default();
        let Self {
            source,
            tree,
            decoder,
            root,
            ..
        } = self;

        for event in decoder.decode(read) {
            stats.events += 1;
            match apply(tree, source, root.as_deref(), &event)? {
                Dispatch::Passed => {}
                Dispatch::Stale => stats.stale += 1,
                Dispatch::Added(n) => stats.added += n,
                Dispatch::Removed(n) => stats.removed += n,
                Dispatch::Released => stats.released += 1,
                Dispatch::Overflow(n) => {
                    stats.overflows += 1;
                    stats.added += n;
                }
            }
        }

        stats.carried = decoder.carried();
        Ok(stats)
    }

    /// Applies a single event to the tree.
    ///
    /// # Errors
    ///
    /// Propagates fatal registration and removal failures.
    pub fn dispatch(&mut self, event: &RawEvent) -> Result<Dispatch> {
        apply(&mut self.tree, &mut self.source, self.root.as_deref(), event)
    }

    /// The watch tree.
    pub const fn tree(&self) -> &WatchTree<L> {
        &self.tree
    }

    /// The event source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// The sync trigger.
    pub const fn sync(&self) -> &T {
        &self.sync
    }

    /// Bytes of an incomplete record waiting for the next read.
    pub const fn carried(&self) -> usize {
        self.decoder.carried()
    }
}

/// Applies one event to `tree`, installing or releasing watches through `registry`.
///
/// After a queue overflow, directories created while events were dropped are only
/// found by walking `root` again; existing entries are left alone.
fn apply<L, R>(
    tree: &mut WatchTree<L>,
    registry: &mut R,
    root: Option<&Path>,
    event: &RawEvent,
) -> Result<Dispatch>
where
    L: DirLister,
    R: WatchRegistry,
{
    if event.is_overflow() {
        warn!("kernel event queue overflowed; rescanning the watched tree");
        output::warning("Event queue overflowed, rescanning the watched tree");
        let added = match root {
            Some(root) => tree.register_subtree(registry, root)?,
            None => 0,
        };
        return Ok(Dispatch::Overflow(added));
    }

    let Some(dir) = tree.resolve(event.handle).map(Path::to_path_buf) else {
        debug!(handle = %event.handle, mask = event.mask, "dropping event for unknown watch");
        return Ok(Dispatch::Stale);
    };

    if event.is_ignored() {
        tree.forget(event.handle);
        return Ok(Dispatch::Released);
    }

    let Some(name) = event.name.as_deref() else {
        trace!(dir = %dir.display(), kind = ?event.kind, "event on watched directory");
        return Ok(Dispatch::Passed);
    };
    let path = dir.join(name);
    debug!(kind = ?event.kind, is_dir = event.is_dir, path = %path.display(), "change");

    if event.removes_directory() {
        let removed = if event.kind == EventKind::Deleted {
            // the kernel already released the watches of a deleted directory
            tree.forget_subtree(&path)
        } else {
            tree.unregister_subtree(registry, &path)?
        };
        return Ok(Dispatch::Removed(removed));
    }

    if event.adds_directory() {
        let added = tree.register_subtree(registry, &path)?;
        return Ok(Dispatch::Added(added));
    }

    Ok(Dispatch::Passed)
}
