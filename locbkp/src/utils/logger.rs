//! Logging configuration using tracing.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the specified level.
///
/// Events always go to stdout. `persistent_log` is appended to across runs;
/// `run_log` is truncated and holds only this run (the orchestrator removes
/// it during cleanup).
pub fn init(level: &str, persistent_log: Option<&Path>, run_log: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let persistent_layer = persistent_log
        .map(|path| open_log(path, true))
        .transpose()?
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    let run_layer = run_log
        .map(|path| open_log(path, false))
        .transpose()?
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(persistent_layer)
        .with(run_layer)
        .try_init()?;

    Ok(())
}

fn open_log(path: &Path, append: bool) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
}
