//! Runtime configuration from the environment.
//!
//! The watched root is the only command-line argument; everything else is read
//! from `RTSYNC_*` variables:
//!
//! | Variable              | Meaning                                  | Default     |
//! |-----------------------|------------------------------------------|-------------|
//! | `RTSYNC_SYNC_CMD`     | sync command line, shell-style quoting   | `./sync.sh` |
//! | `RTSYNC_BUFFER_SIZE`  | event read buffer in bytes               | `4096`      |
//! | `RTSYNC_VERBOSITY`    | `quiet`, `normal` or `verbose`           | `normal`    |
//!
//! `RTSYNC_LOG` (the tracing filter) is read by the binary directly.

use crate::decoder::MAX_RECORD_LEN;
use crate::error::{Result, WatchError};
use crate::output::Verbosity;
use crate::sync::CommandSync;
use std::env;
use tracing::{Level, debug, span};

/// Environment variable holding the sync command line.
pub const SYNC_CMD_VAR: &str = "RTSYNC_SYNC_CMD";
/// Environment variable holding the read buffer size.
pub const BUFFER_SIZE_VAR: &str = "RTSYNC_BUFFER_SIZE";
/// Environment variable holding the output verbosity.
pub const VERBOSITY_VAR: &str = "RTSYNC_VERBOSITY";
/// Environment variable holding the tracing filter directives.
pub const LOG_VAR: &str = "RTSYNC_LOG";

/// Sync command used when none is configured.
pub const DEFAULT_SYNC_CMD: &str = "./sync.sh";
/// Read buffer size used when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Command fired after every batch.
    pub sync: CommandSync,
    /// Size of the event read buffer.
    pub buffer_size: usize,
    /// Verbosity of user-facing output.
    pub verbosity: Verbosity,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves the configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] if a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let span = span!(Level::DEBUG, "resolve_config");
        let _guard = span.enter();

        let command_line = lookup(SYNC_CMD_VAR).unwrap_or_else(|| DEFAULT_SYNC_CMD.to_string());
        let sync = CommandSync::parse(&command_line)?;

        let buffer_size = match lookup(BUFFER_SIZE_VAR) {
            Some(raw) => parse_buffer_size(&raw)?,
            None => DEFAULT_BUFFER_SIZE,
        };

        let verbosity = match lookup(VERBOSITY_VAR) {
            Some(raw) => raw.parse()?,
            None => Verbosity::Normal,
        };

        debug!(command = %command_line, buffer_size, ?verbosity, "configuration resolved");
        Ok(Self {
            sync,
            buffer_size,
            verbosity,
        })
    }
}

/// Parses a buffer size, which must hold at least one maximal event record.
fn parse_buffer_size(raw: &str) -> Result<usize> {
    let size: usize = raw.trim().parse().map_err(|e| {
        WatchError::Config(format!("{BUFFER_SIZE_VAR} must be a byte count, got '{raw}': {e}"))
    })?;

    if size < MAX_RECORD_LEN {
        return Err(WatchError::Config(format!(
            "{BUFFER_SIZE_VAR} must be at least {MAX_RECORD_LEN} bytes, got {size}"
        )));
    }
    Ok(size)
}
