//! Error taxonomy for the watcher.
//!
//! Every variant is fatal by the time it reaches `main`: the watch state cannot be
//! repaired once it diverges from the kernel, so there is no retry path. Events for
//! handles that are no longer tracked are not errors at all; the loop drops them.

use crate::channel::WatchHandle;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors raised by the watch tree, the event channel and the driving loop.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Invalid invocation or environment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Directory access, watch registration or event channel failure.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The OS refused to release a watch the tree still considered active.
    #[error("watch {handle} for {} was rejected on removal: {source}", path.display())]
    Consistency {
        /// Handle the tree held.
        handle: WatchHandle,
        /// Path the handle was registered for.
        path: PathBuf,
        /// Error returned by the OS.
        #[source]
        source: io::Error,
    },
}

impl WatchError {
    /// Wraps an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns a short label for the error category.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io { .. } => "io",
            Self::Consistency { .. } => "consistency",
        }
    }
}
