//! Command-line interface definition.
//!
//! Shared between the binary and xtask (man page generation). Everything except the
//! watched root is configured through `RTSYNC_*` environment variables.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use clap::Parser;
use std::path::PathBuf;

/// Main CLI structure for rtsync.
#[derive(Parser, Debug)]
#[command(
    name = "rtsync",
    version = crate::VERSION,
    about = "Watch a directory tree and run a sync command on every change",
    long_about = "Recursively watches ROOT with inotify. The sync command runs once at \
                  startup and once after every batch of changes.",
    after_help = "Environment:\n  \
                  RTSYNC_SYNC_CMD      sync command line (default: ./sync.sh)\n  \
                  RTSYNC_BUFFER_SIZE   event buffer size in bytes (default: 4096)\n  \
                  RTSYNC_VERBOSITY     quiet, normal or verbose\n  \
                  RTSYNC_LOG           tracing filter (default: info)"
)]
pub struct Cli {
    /// Directory tree to watch
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,
}
