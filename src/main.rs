use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use rtsync::cli::Cli;
use rtsync::config::{Config, LOG_VAR};
use rtsync::{Inotify, WatchError, WatchLoop, WatchTree, output};
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env()?;
    output::set_verbosity(config.verbosity);

    let root = fs::canonicalize(&cli.root)
        .map_err(|e| WatchError::io(format!("cannot access {}", cli.root.display()), e))?;

    let channel = Inotify::init()
        .map_err(|e| WatchError::io("failed to initialize inotify", e))?;

    let mut watcher = WatchLoop::new(channel, WatchTree::new(), config.sync, config.buffer_size);
    let watched = watcher.watch_root(&root)?;

    output::action(
        "Watching",
        &format!("{watched} directories under {}", root.display()),
    );

    watcher.run()?;
    Ok(())
}

/// Sends diagnostics to stderr, filtered by `RTSYNC_LOG` (default: info).
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
