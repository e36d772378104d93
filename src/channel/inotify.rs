use super::{EventSource, WatchHandle, WatchRegistry, mask};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, trace};

const _: () = {
    assert!(mask::MODIFY == libc::IN_MODIFY);
    assert!(mask::MOVED_FROM == libc::IN_MOVED_FROM);
    assert!(mask::MOVED_TO == libc::IN_MOVED_TO);
    assert!(mask::CREATE == libc::IN_CREATE);
    assert!(mask::DELETE == libc::IN_DELETE);
    assert!(mask::Q_OVERFLOW == libc::IN_Q_OVERFLOW);
    assert!(mask::IGNORED == libc::IN_IGNORED);
    assert!(mask::ISDIR == libc::IN_ISDIR);
    assert!(mask::ONLYDIR == libc::IN_ONLYDIR);
};

/// Blocking inotify instance. The descriptor is closed on drop.
#[derive(Debug)]
pub struct Inotify {
    /// inotify file descriptor.
    fd: OwnedFd,
}

impl Inotify {
    /// Opens a new inotify instance in blocking mode.
    ///
    /// # Errors
    ///
    /// Returns the OS error, typically `EMFILE` when the per-user instance limit
    /// is reached.
    pub fn init() -> io::Result<Self> {
        // SAFETY: plain syscall, no pointers involved.
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        debug!(fd, "inotify instance opened");
        // SAFETY: fd was just returned by inotify_init1 and is owned by nobody else.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }
}

impl WatchRegistry for Inotify {
    fn add_watch(&mut self, path: &Path, mask: u32) -> io::Result<WatchHandle> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let wd = unsafe { libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), mask) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        trace!(wd, path = %path.display(), "watch added");
        Ok(WatchHandle::from_raw(wd))
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        // SAFETY: plain syscall, no pointers involved.
        let res = unsafe { libc::inotify_rm_watch(self.fd.as_raw_fd(), handle.as_raw()) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        trace!(wd = handle.as_raw(), "watch removed");
        Ok(())
    }
}

impl EventSource for Inotify {
    fn read_events(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            // SAFETY: buf is valid for writes of buf.len() bytes.
            let res = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr().cast::<libc::c_void>(),
                    buf.len(),
                )
            };
            if let Ok(n) = usize::try_from(res) {
                return Ok(n);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}
