//! # Event stream decoder
//!
//! Turns the bytes read from the notification channel into [`RawEvent`]s.
//!
//! ## Wire format
//!
//! The kernel delivers a sequence of variable-size records:
//!
//! ```text
//! ┌──────────┬───────────┬─────────────┬──────────┬─────────────────────────┐
//! │ wd: i32  │ mask: u32 │ cookie: u32 │ len: u32 │ name: [u8; len] (NUL    │
//! │          │           │             │          │ padded, may be empty)   │
//! └──────────┴───────────┴─────────────┴──────────┴─────────────────────────┘
//!  16-byte header, native endian
//! ```
//!
//! ## Fragment carry
//!
//! A read can end in the middle of a record. Decoding stops at the first record that
//! is not completely available; when the [`Events`] iterator is dropped the
//! unconsumed tail is moved to the front of the working buffer and the next read is
//! appended after it. Decoding a stream split at any byte boundary therefore yields
//! the same events as decoding it in one piece.

use crate::channel::{WatchHandle, mask};
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use tracing::warn;

/// Size of the fixed record header.
pub const HEADER_LEN: usize = 16;

/// Longest file name the kernel reports, without the terminating NUL.
pub const NAME_MAX: usize = 255;

/// Largest record the kernel can emit (header plus a maximal NUL-terminated name).
pub const MAX_RECORD_LEN: usize = HEADER_LEN + NAME_MAX + 1;

/// Action reported by an event, derived from its mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Entry created.
    Created,
    /// Entry deleted.
    Deleted,
    /// File contents modified.
    Modified,
    /// Entry moved into the watched directory.
    MovedIn,
    /// Entry moved out of the watched directory.
    MovedOut,
    /// No actionable flag (ignored watch, queue overflow, ...).
    Other,
}

impl EventKind {
    /// Classifies a raw mask.
    #[must_use]
    pub const fn from_mask(bits: u32) -> Self {
        if bits & mask::CREATE != 0 {
            Self::Created
        } else if bits & mask::MOVED_TO != 0 {
            Self::MovedIn
        } else if bits & mask::DELETE != 0 {
            Self::Deleted
        } else if bits & mask::MOVED_FROM != 0 {
            Self::MovedOut
        } else if bits & mask::MODIFY != 0 {
            Self::Modified
        } else {
            Self::Other
        }
    }
}

/// One decoded change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Watch the event was reported against.
    pub handle: WatchHandle,
    /// Raw event mask.
    pub mask: u32,
    /// Pairs the two halves of a rename; zero otherwise.
    pub cookie: u32,
    /// Classified action.
    pub kind: EventKind,
    /// Whether the subject is a directory.
    pub is_dir: bool,
    /// Child name, absent for events about the watched directory itself.
    pub name: Option<OsString>,
}

impl RawEvent {
    /// A directory appeared under the watch (created or moved in).
    #[must_use]
    pub const fn adds_directory(&self) -> bool {
        self.is_dir && matches!(self.kind, EventKind::Created | EventKind::MovedIn)
    }

    /// A directory left the watch (deleted or moved out).
    #[must_use]
    pub const fn removes_directory(&self) -> bool {
        self.is_dir && matches!(self.kind, EventKind::Deleted | EventKind::MovedOut)
    }

    /// The kernel released this watch.
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        self.mask & mask::IGNORED != 0
    }

    /// The kernel event queue overflowed and events were lost.
    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        self.mask & mask::Q_OVERFLOW != 0
    }
}

/// Working buffer plus the fragment carried over from the previous read.
#[derive(Debug)]
pub struct EventDecoder {
    /// Read buffer; `buf[..carried]` holds the pending fragment.
    buf: Vec<u8>,
    /// Length of the fragment at the front of `buf`.
    carried: usize,
}

impl EventDecoder {
    /// Creates a decoder with a working buffer of `capacity` bytes.
    ///
    /// The capacity should be at least [`MAX_RECORD_LEN`], otherwise a long name
    /// can never be completed.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            carried: 0,
        }
    }

    /// Total size of the working buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes carried over from an incomplete record.
    #[must_use]
    pub const fn carried(&self) -> usize {
        self.carried
    }

    /// Free space after the carried fragment; the next read goes here.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.carried..]
    }

    /// Decodes the carried fragment followed by `read` newly read bytes.
    ///
    /// Events are produced lazily. Whatever the iterator has not consumed when it
    /// is dropped becomes the new carried fragment.
    pub fn decode(&mut self, read: usize) -> Events<'_> {
        let end = (self.carried + read).min(self.buf.len());
        self.carried = 0;
        Events {
            decoder: self,
            pos: 0,
            end,
        }
    }

    /// Feeds `bytes` through the spare area and collects the decoded events.
    ///
    /// Convenience for callers that already hold the bytes; a chunk larger than the
    /// spare space is fed in several steps. Returns the events together with the
    /// number of bytes that could not be accepted: that only happens once the buffer
    /// is completely filled by a record too long to ever complete.
    pub fn try_feed(&mut self, mut bytes: &[u8]) -> (Vec<RawEvent>, usize) {
        let mut out = Vec::new();
        while !bytes.is_empty() {
            let spare = self.spare_mut();
            if spare.is_empty() {
                break;
            }
            let n = spare.len().min(bytes.len());
            spare[..n].copy_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
            out.extend(self.decode(n));
        }
        (out, bytes.len())
    }

    /// Like [`EventDecoder::try_feed`], for streams known to fit the buffer.
    ///
    /// Bytes that cannot be accepted are dropped with a warning.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<RawEvent> {
        let (events, rejected) = self.try_feed(bytes);
        if rejected > 0 {
            warn!(
                rejected,
                capacity = self.capacity(),
                "event record larger than the decoder buffer; input dropped"
            );
        }
        events
    }
}

/// Lazy sequence of events decoded from one read.
#[derive(Debug)]
pub struct Events<'a> {
    /// Decoder owning the buffer.
    decoder: &'a mut EventDecoder,
    /// Start of the next undecoded record.
    pos: usize,
    /// End of valid data in the buffer.
    end: usize,
}

impl Iterator for Events<'_> {
    type Item = RawEvent;

    fn next(&mut self) -> Option<RawEvent> {
        let bytes = &self.decoder.buf[self.pos..self.end];
        if bytes.len() < HEADER_LEN {
            return None;
        }

        let name_len = u32::from_ne_bytes(word(bytes, 12)) as usize;
        let record_len = HEADER_LEN + name_len;
        if record_len > bytes.len() {
            return None;
        }

        let wd = i32::from_ne_bytes(word(bytes, 0));
        let bits = u32::from_ne_bytes(word(bytes, 4));
        let cookie = u32::from_ne_bytes(word(bytes, 8));

        let raw_name = &bytes[HEADER_LEN..record_len];
        let trimmed = &raw_name[..raw_name.iter().position(|&b| b == 0).unwrap_or(name_len)];
        let name = (!trimmed.is_empty()).then(|| OsStr::from_bytes(trimmed).to_os_string());

        self.pos += record_len;

        Some(RawEvent {
            handle: WatchHandle::from_raw(wd),
            mask: bits,
            cookie,
            kind: EventKind::from_mask(bits),
            is_dir: bits & mask::ISDIR != 0,
            name,
        })
    }
}

impl Drop for Events<'_> {
    fn drop(&mut self) {
        let tail = self.end - self.pos;
        self.decoder.buf.copy_within(self.pos..self.end, 0);
        self.decoder.carried = tail;
    }
}

/// Copies the 4-byte header field starting at `at`.
fn word(bytes: &[u8], at: usize) -> [u8; 4] {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    raw
}

/// Encodes one record the way the kernel lays it out, padding the name with NULs
/// to a multiple of the header size.
///
/// Used to drive the decoder from in-memory event sources.
#[must_use]
pub fn encode_record(handle: WatchHandle, bits: u32, cookie: u32, name: Option<&str>) -> Vec<u8> {
    let name_len = name.map_or(0, |n| (n.len() + 1).div_ceil(HEADER_LEN) * HEADER_LEN);
    let mut out = Vec::with_capacity(HEADER_LEN + name_len);
    out.extend_from_slice(&handle.as_raw().to_ne_bytes());
    out.extend_from_slice(&bits.to_ne_bytes());
    out.extend_from_slice(&cookie.to_ne_bytes());
    out.extend_from_slice(&u32::try_from(name_len).unwrap_or(u32::MAX).to_ne_bytes());
    if let Some(n) = name {
        out.extend_from_slice(n.as_bytes());
        out.resize(HEADER_LEN + name_len, 0);
    }
    out
}
