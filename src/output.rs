//! User-facing status lines on stderr.
//!
//! Routine messages are dimmed, warnings and errors are bold. Diagnostics for
//! developers go through `tracing` instead; this module is what an operator sees.

use crate::error::WatchError;
use colored::Colorize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Verbosity level for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet = 0,
    /// Startup and status messages.
    Normal = 1,
    /// Also report every sync run.
    Verbose = 2,
}

impl FromStr for Verbosity {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "normal" => Ok(Self::Normal),
            "verbose" => Ok(Self::Verbose),
            other => Err(WatchError::Config(format!(
                "unknown verbosity '{other}' (expected quiet, normal or verbose)"
            ))),
        }
    }
}

/// Current level, stored as its discriminant.
static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Normal as u8);

/// Sets the process-wide verbosity.
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Returns the process-wide verbosity.
pub fn verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

/// Whether messages needing at least `min` are printed at the current level.
fn shown(min: Verbosity) -> bool {
    verbosity() as u8 >= min as u8
}

/// Writes `line` to stderr when the current level is at least `min`.
fn emit(min: Verbosity, line: impl fmt::Display) {
    if shown(min) {
        eprintln!("{line}");
    }
}

/// Fatal or failed operations; never suppressed.
pub fn error(message: &str) {
    emit(Verbosity::Quiet, message.red().bold());
}

/// Degraded operation, e.g. a failed sync run; never suppressed.
pub fn warning(message: &str) {
    emit(Verbosity::Quiet, message.yellow().bold());
}

/// Routine status.
pub fn info(message: &str) {
    emit(Verbosity::Normal, message.dimmed());
}

/// Per-sync detail.
pub fn verbose(message: &str) {
    emit(Verbosity::Verbose, message.dimmed());
}

/// Status line led by a bold verb: `Watching 12 directories under /srv`.
pub fn action(verb: &str, message: &str) {
    emit(Verbosity::Normal, format_args!("{} {message}", verb.dimmed().bold()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_verbosity_round_trip() {
        for level in [Verbosity::Quiet, Verbosity::Verbose, Verbosity::Normal] {
            set_verbosity(level);
            assert_eq!(verbosity(), level);
        }
    }

    #[test]
    #[serial]
    fn test_quiet_keeps_only_warnings_and_errors() {
        set_verbosity(Verbosity::Quiet);
        assert!(shown(Verbosity::Quiet));
        assert!(!shown(Verbosity::Normal));
        assert!(!shown(Verbosity::Verbose));

        set_verbosity(Verbosity::Verbose);
        assert!(shown(Verbosity::Verbose));

        set_verbosity(Verbosity::Normal);
        assert!(shown(Verbosity::Normal));
        assert!(!shown(Verbosity::Verbose));
    }

    #[test]
    fn test_parse_verbosity() {
        assert_eq!("quiet".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert_eq!(" Verbose ".parse::<Verbosity>().unwrap(), Verbosity::Verbose);
        assert!("loud".parse::<Verbosity>().is_err());
    }
}
