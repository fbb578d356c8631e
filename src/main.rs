//! treewatch - recursive filesystem change notification
//!
//! Entry point for the treewatch CLI.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::Receiver;
use treewatch::observability::{init_tracing, TracingConfig};
use treewatch::{Config, OutputFormat, WatchEvent, WatchTree};

/// treewatch - print create, change and delete events for files and directory trees
#[derive(Parser, Debug)]
#[command(name = "treewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files or directories to watch
    #[arg(required = true, env = "TREEWATCH_PATHS", value_delimiter = ',')]
    paths: Vec<std::path::PathBuf>,

    /// Only watch the directories themselves at startup, not their contents
    #[arg(long, env = "TREEWATCH_NO_RECURSE")]
    no_recurse: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TREEWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TREEWATCH_LOG_JSON")]
    log_json: bool,

    /// Print events as JSON lines
    #[arg(long, env = "TREEWATCH_JSON")]
    json: bool,
}

/// How long one pump iteration waits for the backend.
const PUMP_INTERVAL: Duration = Duration::from_millis(500);

/// Write one event as a line.
fn write_event(out: &mut impl Write, format: OutputFormat, event: &WatchEvent) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{event}")?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, event)?;
            writeln!(out)?;
        }
    }
    out.flush()
}

/// Print everything queued on `events`.
///
/// Returns `Ok(false)` once stdout has gone away.
fn print_events(
    out: &mut impl Write,
    format: OutputFormat,
    events: &Receiver<WatchEvent>,
) -> anyhow::Result<bool> {
    for event in events.try_iter() {
        match write_event(out, format, &event) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(false),
            Err(e) => return Err(e).context("failed to write event"),
        }
    }
    Ok(true)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        paths: cli.paths,
        recurse: !cli.no_recurse,
        log_level: cli.log_level,
        log_json: cli.log_json,
        output: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
    };

    config.validate()?;
    init_tracing(&TracingConfig::from(&config));

    tracing::info!("treewatch v{} starting...", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?config, "Configuration loaded");

    let mut tree = WatchTree::new(config.watch_options())?;
    let events = tree.subscribe();
    let mut stdout = io::stdout().lock();

    for path in &config.paths {
        tree.watch(path)
            .with_context(|| format!("failed to watch {}", path.display()))?;
    }

    tracing::info!(paths = tree.len(), "Watch established");

    let mut open = print_events(&mut stdout, config.output, &events)?;
    while open && !tree.is_empty() {
        tree.process_timeout(PUMP_INTERVAL);
        open = print_events(&mut stdout, config.output, &events)?;
    }

    if open {
        tracing::info!("Nothing left to watch");
    } else {
        tracing::info!("Output closed, stopping");
    }
    tree.clear();

    let stats = tree.stats().snapshot();
    tracing::info!(
        notifications = stats.notifications,
        created = stats.created,
        changed = stats.changed,
        deleted = stats.deleted,
        "Watch finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Writer whose reader has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn delete_event() -> WatchEvent {
        WatchEvent::Delete {
            path: PathBuf::from("/w/a.txt"),
        }
    }

    #[test]
    fn test_write_event_formats() {
        let mut out = Vec::new();
        write_event(&mut out, OutputFormat::Text, &delete_event()).unwrap();
        write_event(&mut out, OutputFormat::Json, &delete_event()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "delete /w/a.txt\n{\"event\":\"delete\",\"path\":\"/w/a.txt\"}\n"
        );
    }

    #[test]
    fn test_print_events_stops_on_closed_output() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(delete_event()).unwrap();

        let open = print_events(&mut ClosedPipe, OutputFormat::Text, &rx).unwrap();
        assert!(!open);
    }

    #[test]
    fn test_print_events_keeps_going_on_open_output() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(delete_event()).unwrap();
        let mut out = Vec::new();

        assert!(print_events(&mut out, OutputFormat::Text, &rx).unwrap());
        assert!(!out.is_empty());
    }
}
