//! LocBkp - Main entry point
//!
//! Backs up the paths listed in a backup list file.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use locbkp::{utils, BackupRun, BackupSpec, Settings, VERSION};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

/// Exit status for failures before anything was staged
const EXIT_FATAL: u8 = 1;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backup list to use (JSON)
    #[arg(value_name = "BACKUP_LIST")]
    backup_list: PathBuf,

    /// Path to tool settings file (TOML)
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(args.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("locbkp: {:#}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let started_at = Local::now().naive_local();
    let run_log = run_log_path(&args.backup_list, &started_at);

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&settings.log.level);
    if let Err(e) = utils::logger::init(log_level, settings.log.file.as_deref(), Some(&run_log)) {
        eprintln!("locbkp: could not initialize logging: {:#}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    info!("LocBkp v{} started.", VERSION);

    let spec = match BackupSpec::load(&args.backup_list) {
        Ok(spec) => spec,
        Err(e) => {
            error!("{}. Cannot proceed, exiting...", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let mut run = BackupRun::new(spec, &settings, started_at).with_run_log(run_log);
    match run.execute() {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            error!("{}. Cannot proceed, exiting...", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("could not load settings from {}", path.display())),
        None => Ok(Settings::default()),
    }
}

/// Per-run log in the temp directory, named after the backup list file
fn run_log_path(backup_list: &Path, started_at: &chrono::NaiveDateTime) -> PathBuf {
    let list_name = backup_list
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());
    std::env::temp_dir().join(format!(
        "LocBkp_{}_{}.log",
        list_name,
        started_at.format(locbkp::retention::DATE_FORMAT)
    ))
}
