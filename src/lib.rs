#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
// Allow pedantic strict lints that create false positives in this codebase
#![allow(clippy::arithmetic_side_effects)] // Counters and offsets are bounded by the buffer
#![allow(clippy::indexing_slicing)] // Record bounds are checked before slicing

//! # rtsync - Real-Time Tree Synchronization Trigger
//!
//! rtsync watches a directory tree with inotify and runs an external command
//! (typically an `rsync` wrapper) whenever something in the tree changes. It does
//! not copy anything itself.
//!
//! ## How it works
//!
//! - Every directory under the root gets its own watch; new directories are
//!   watched as they appear and watches are released when directories leave.
//! - Events are read in batches. One read is one batch, and the sync command runs
//!   once per batch, plus once at startup.
//! - The sync command runs to completion before the next read, so runs never
//!   overlap. Changes that happen meanwhile queue up in the kernel and form the
//!   next batch.
//!
//! ## Architecture
//!
//! - [`channel`]: watch handles and the inotify channel
//! - [`decoder`]: binary event records with fragment carry between reads
//! - [`tree`]: bidirectional handle/path map with recursive registration
//! - [`watcher`]: the read → decode → dispatch → sync loop
//! - [`sync`]: the external sync command
//! - [`config`], [`cli`], [`output`], [`error`]: the outer surface
//!
//! ## Example Usage
//!
//! ```no_run
//! use rtsync::{CommandSync, Inotify, WatchLoop, WatchTree};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let sync = CommandSync::parse("rsync -a --delete /srv/data/ backup:/srv/data/")?;
//! let channel = Inotify::init()?;
//!
//! let mut watcher = WatchLoop::new(channel, WatchTree::new(), sync, 4096);
//! watcher.watch_root(Path::new("/srv/data"))?;
//! watcher.run()?;
//! # Ok(())
//! # }
//! ```

/// Kernel notification channel and watch handles.
pub mod channel;

/// Command-line interface definition.
pub mod cli;

/// Environment-based configuration.
pub mod config;

/// Event record decoding.
pub mod decoder;

/// Error types.
pub mod error;

/// Colored, verbosity-aware status output.
pub mod output;

/// External sync command.
pub mod sync;

/// Watch handle to directory path mapping.
pub mod tree;

/// The driving loop.
pub mod watcher;

/// In-memory fakes shared by unit tests.
#[cfg(test)]
mod test_utils;

pub use channel::{Inotify, WatchHandle};
pub use decoder::{EventDecoder, EventKind, RawEvent};
pub use error::{Result, WatchError};
pub use sync::{CommandSync, SyncOutcome, SyncTrigger};
pub use tree::WatchTree;
pub use watcher::{BatchStats, WatchLoop};

/// Current version of the rtsync binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
