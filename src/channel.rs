//! Kernel notification channel: watch handles, event mask bits and the two
//! capabilities the rest of the crate needs from the channel.
//!
//! [`WatchRegistry`] installs and releases per-directory watches, [`EventSource`]
//! delivers the raw event bytes. [`Inotify`] implements both on Linux; tests
//! substitute in-memory fakes.

use std::fmt;
use std::io;
use std::path::Path;

/// Linux inotify implementation.
mod inotify;

pub use inotify::Inotify;

/// Event mask bits as defined by the inotify ABI.
pub mod mask {
    /// File was modified.
    pub const MODIFY: u32 = 0x0000_0002;
    /// File moved out of the watched directory.
    pub const MOVED_FROM: u32 = 0x0000_0040;
    /// File moved into the watched directory.
    pub const MOVED_TO: u32 = 0x0000_0080;
    /// Subfile was created.
    pub const CREATE: u32 = 0x0000_0100;
    /// Subfile was deleted.
    pub const DELETE: u32 = 0x0000_0200;
    /// Event queue overflowed.
    pub const Q_OVERFLOW: u32 = 0x0000_4000;
    /// Watch was removed, explicitly or because the directory went away.
    pub const IGNORED: u32 = 0x0000_8000;
    /// Event subject is a directory.
    pub const ISDIR: u32 = 0x4000_0000;
    /// Registration flag: refuse to watch anything but a directory (`ENOTDIR`).
    pub const ONLYDIR: u32 = 0x0100_0000;
}

/// Mask installed on every watched directory. There is no per-directory variation.
pub const WATCH_MASK: u32 =
    mask::MODIFY | mask::CREATE | mask::DELETE | mask::ISDIR | mask::MOVED_FROM | mask::MOVED_TO;

/// Opaque identifier of one active directory watch.
///
/// Only meaningful while the watch is active: the kernel may hand the same value
/// out again once the watch has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(i32);

impl WatchHandle {
    /// Wraps a raw watch descriptor.
    #[must_use]
    pub const fn from_raw(wd: i32) -> Self {
        Self(wd)
    }

    /// Returns the raw watch descriptor.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Installs and releases directory watches.
pub trait WatchRegistry {
    /// Starts watching `path` with `mask` and returns its handle.
    ///
    /// Watching an already watched directory returns the existing handle.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the watch cannot be installed.
    fn add_watch(&mut self, path: &Path, mask: u32) -> io::Result<WatchHandle>;

    /// Releases a watch.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the handle is not (or no longer) active.
    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()>;
}

/// Blocking source of raw event bytes.
pub trait EventSource {
    /// Blocks until events are available and copies as many as fit into `buf`.
    ///
    /// # Errors
    ///
    /// Returns the OS error on read failure.
    fn read_events(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
