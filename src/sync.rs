//! External synchronization trigger.
//!
//! The watcher never transfers data itself. After every batch of changes it runs a
//! fixed command (typically an `rsync` wrapper) and waits for it to exit before
//! reading the next batch, so two runs never overlap. There is no timeout: a sync
//! command that hangs stalls the watcher.

use crate::error::{Result, WatchError};
use crate::output;
use command_group::CommandGroup;
use std::process::{Command, Stdio};
use tracing::{Level, debug, error, span, warn};

/// Result of one synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The command exited successfully.
    Success,
    /// The command exited with a failure status (`None` when killed by a signal).
    Failed(Option<i32>),
    /// The command could not be started.
    SpawnFailed,
}

/// Fire-and-wait synchronization action.
pub trait SyncTrigger {
    /// Runs one synchronization and blocks until it is finished.
    ///
    /// Failures are reported in the outcome, never as errors: the watcher keeps
    /// running whatever the sync command does.
    fn fire(&mut self) -> SyncOutcome;
}

/// Runs an external command in its own process group.
#[derive(Debug, Clone)]
pub struct CommandSync {
    /// Program to execute.
    program: String,
    /// Fixed arguments.
    args: Vec<String>,
    /// Number of runs so far.
    runs: u64,
}

impl CommandSync {
    /// Creates a trigger for `program` with fixed `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            runs: 0,
        }
    }

    /// Parses a command line with shell-like quoting, e.g.
    /// `rsync -a --delete '/srv/my data/' backup:/srv/data`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Config`] for unbalanced quotes or an empty command.
    pub fn parse(command_line: &str) -> Result<Self> {
        let span = span!(Level::DEBUG, "parse_sync_command", command_line);
        let _guard = span.enter();

        let mut parts = shell_words::split(command_line).map_err(|e| {
            WatchError::Config(format!("invalid sync command syntax '{command_line}': {e}"))
        })?;

        if parts.is_empty() {
            return Err(WatchError::Config("empty sync command".to_string()));
        }

        let program = parts.remove(0);
        debug!(program = %program, args = ?parts, "sync command parsed");
        Ok(Self::new(program, parts))
    }

    /// Program that is executed.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fixed arguments passed on every run.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Number of times the command has been fired.
    #[must_use]
    pub const fn runs(&self) -> u64 {
        self.runs
    }
}

impl SyncTrigger for CommandSync {
    fn fire(&mut self) -> SyncOutcome {
        self.runs += 1;
        let span = span!(Level::DEBUG, "sync", run = self.runs, program = %self.program);
        let _guard = span.enter();

        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .group_spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!(error = %e, "failed to start sync command");
                output::error(&format!("Could not start sync command {}: {e}", self.program));
                return SyncOutcome::SpawnFailed;
            }
        };

        match child.wait() {
            Ok(status) if status.success() => {
                debug!("sync command finished");
                output::verbose(&format!("Synced (run {})", self.runs));
                SyncOutcome::Success
            }
            Ok(status) => {
                warn!(code = ?status.code(), "sync command exited with failure status");
                output::warning(&format!("Sync command failed ({status})"));
                SyncOutcome::Failed(status.code())
            }
            Err(e) => {
                error!(error = %e, "failed to wait for sync command");
                SyncOutcome::Failed(None)
            }
        }
    }
}
