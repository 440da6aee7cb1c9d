//! Backup run orchestration.
//!
//! A run moves through its states strictly in order:
//!
//! `Init → Preparing → Staging → Compressing → Transferring → CleaningUp → Retaining → Done`
//!
//! Only `Init` can fail the run outright (no staging root, staging directory
//! not creatable). Later per-item failures are logged and the run goes on
//! with what is left. A failed compression or transfer means there is no new
//! archive at the destination: transfer and retention are skipped, cleanup
//! still runs, and the outcome says so.

pub mod report;
pub mod stats;

use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::backup_list::BackupSpec;
use crate::compress::{CompressError, Compressor};
use crate::config::Settings;
use crate::fs::space::{bytes_to_mb, default_probe, dir_size_mb, SpaceProbe};
use crate::fs::walker::{EnumerationResult, TreeEnumerator, WalkOptions};
use crate::retention::{archive_file_name, RetentionManager, DATE_FORMAT};
use crate::staging::{StagingArea, StagingSelector};
use crate::transfer::progress::ProgressLogger;
use crate::transfer::Transferor;
use crate::Result;
use report::BackupReport;
use stats::BackupRunStats;

/// Tool version, recorded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Init,
    Preparing,
    Staging,
    Compressing,
    Transferring,
    CleaningUp,
    Retaining,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Preparing => "preparing",
            RunState::Staging => "staging",
            RunState::Compressing => "compressing",
            RunState::Transferring => "transferring",
            RunState::CleaningUp => "cleaning up",
            RunState::Retaining => "retaining",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a run that got past `Init` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The archive reached the destination
    Completed { archive: PathBuf },
    /// The pipeline ran to the end without delivering an archive
    NoArchive { reason: String },
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed { .. } => 0,
            RunOutcome::NoArchive { .. } => 2,
        }
    }
}

/// One backup run. Owns its statistics for its whole lifetime.
pub struct BackupRun {
    spec: BackupSpec,
    compressor: Box<dyn Compressor>,
    probe: Box<dyn SpaceProbe>,
    staging_candidates: Vec<PathBuf>,
    walk_options: WalkOptions,
    run_log: Option<PathBuf>,
    started_at: NaiveDateTime,
    state: RunState,
    stats: BackupRunStats,
}

impl BackupRun {
    pub fn new(spec: BackupSpec, settings: &Settings, started_at: NaiveDateTime) -> Self {
        let walk_options = WalkOptions {
            follow_links: settings.staging.follow_links,
            max_depth: settings.staging.max_depth,
            exclude_patterns: spec.exclude.clone(),
        };

        Self {
            spec,
            compressor: settings.compressor(),
            probe: default_probe(),
            staging_candidates: settings.staging_candidates(),
            walk_options,
            run_log: None,
            started_at,
            state: RunState::Init,
            stats: BackupRunStats::new(),
        }
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn SpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_staging_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.staging_candidates = candidates;
        self
    }

    /// Per-run log file to delete during cleanup
    pub fn with_run_log(mut self, run_log: PathBuf) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &BackupRunStats {
        &self.stats
    }

    /// Name of the archive this run delivers to the destination
    pub fn archive_file_name(&self) -> String {
        archive_file_name(&self.spec.backup_name, &self.started_at, self.compressor.extension())
    }

    /// Run the whole pipeline. An `Err` is an `Init` failure: nothing was
    /// staged and the caller should exit with a fatal status.
    pub fn execute(&mut self) -> Result<RunOutcome> {
        let plan = StagingSelector::new(self.probe.as_ref()).select(
            &self.spec.sources,
            &self.spec.dest_dir,
            &self.staging_candidates,
        )?;
        let staging_name = format!("{}_{}", self.spec.backup_name, self.started_at.format(DATE_FORMAT));
        let area = StagingArea::create(&plan.root, &staging_name)?;
        let archive_path = plan.root.join(self.archive_file_name());

        self.advance(RunState::Preparing);
        let lists = self.prepare();

        self.advance(RunState::Staging);
        let (files, dirs) = self.stage(&area, &lists);

        self.advance(RunState::Compressing);
        let compressed = self.compress(&area, &archive_path, &files, &dirs);

        self.advance(RunState::Transferring);
        let delivered = match compressed {
            Ok(()) => self.transfer(&archive_path),
            Err(e) => {
                error!("Could not compress backup: {}", e);
                Err(format!("compression failed: {}", e))
            }
        };

        self.advance(RunState::CleaningUp);
        self.cleanup(&area, &archive_path);

        self.advance(RunState::Retaining);
        let outcome = match delivered {
            Ok(archive) => {
                self.retain();
                RunOutcome::Completed { archive }
            }
            Err(reason) => {
                warn!("No new archive at the destination, skipping retention");
                RunOutcome::NoArchive { reason }
            }
        };

        self.advance(RunState::Done);
        self.stats.log_summary();
        match &outcome {
            RunOutcome::Completed { archive } => info!("Done. Archive: {}", archive.display()),
            RunOutcome::NoArchive { reason } => error!("Done without an archive: {}", reason),
        }

        Ok(outcome)
    }

    /// Move to the next state, closing the timing interval of the one left
    fn advance(&mut self, next: RunState) {
        debug_assert!(next > self.state, "run state went from {} to {}", self.state, next);

        match self.state {
            RunState::Preparing => self.stats.preparation = self.stats.lap(),
            RunState::Staging => self.stats.staging = self.stats.lap(),
            RunState::Compressing => self.stats.compression = self.stats.lap(),
            RunState::Transferring => self.stats.transfer = self.stats.lap(),
            RunState::CleaningUp => self.stats.cleanup = self.stats.lap(),
            RunState::Init | RunState::Retaining | RunState::Done => {}
        }

        info!("State: {} -> {}", self.state, next);
        self.state = next;
    }

    fn prepare(&mut self) -> EnumerationResult {
        let mut enumerator = TreeEnumerator::new(self.walk_options.clone());
        let lists = enumerator.prepare_backup_lists(&self.spec.sources);

        self.stats.skipped_paths = enumerator.skipped().len();
        info!(
            "Found {} files and {} directories to back up ({} unreadable paths skipped)",
            lists.files.len(),
            lists.dirs.len(),
            self.stats.skipped_paths
        );
        lists
    }

    fn stage(&mut self, area: &StagingArea, lists: &EnumerationResult) -> (Vec<PathBuf>, Vec<PathBuf>) {
        info!("Creating directory structure: {} directories...", lists.dirs.len());
        let dirs = area.materialize_dirs(&lists.dirs);

        info!("Backing up {} files to {}...", lists.files.len(), area.path().display());
        let mut progress = ProgressLogger::new(lists.files.len());
        let files = area.copy_files(&lists.files, |done, _total| {
            progress.update(done);
        });
        info!("Done backing up files.");

        self.stats.files_backed = files.len();
        self.stats.dirs_backed = dirs.backed.len();
        self.stats.dirs_created = dirs.created;
        (files, dirs.backed)
    }

    fn compress(
        &mut self,
        area: &StagingArea,
        archive_path: &Path,
        files: &[PathBuf],
        dirs: &[PathBuf],
    ) -> std::result::Result<(), CompressError> {
        self.stats.size_before_mb = dir_size_mb(area.path());
        info!("Backed up {:.3}MB of data.", self.stats.size_before_mb);

        let report = BackupReport::new(files, dirs, self.stats.size_before_mb);
        match report.write_to(area.path(), &self.started_at) {
            Ok(path) => info!("Backup report written to {}", path.display()),
            Err(e) => error!("Could not create backup report: {}", e),
        }

        info!("Compressing backup...");
        self.compressor
            .compress(area.path(), archive_path, self.spec.create_subdir)?;

        let size = std::fs::metadata(archive_path)
            .map_err(|_| CompressError::MissingOutput(archive_path.to_path_buf()))?
            .len();
        let size_mb = bytes_to_mb(size);
        self.stats.size_after_mb = Some(size_mb);
        info!("Backup is compressed. Compressed size is {:.3}MB", size_mb);
        Ok(())
    }

    fn transfer(&mut self, archive_path: &Path) -> std::result::Result<PathBuf, String> {
        info!("Transferring backup to {}...", self.spec.dest_dir.display());
        Transferor::new(&self.spec.dest_dir)
            .transfer(archive_path, &self.archive_file_name())
            .map_err(|e| {
                error!("Could not transfer backup: {}", e);
                e.to_string()
            })
    }

    fn cleanup(&mut self, area: &StagingArea, archive_path: &Path) {
        info!("Cleaning up...");
        if archive_path.exists() {
            if let Err(e) = std::fs::remove_file(archive_path) {
                warn!("Could not remove {}: {}", archive_path.display(), e);
            }
        }
        if let Err(e) = area.remove() {
            warn!("Could not remove staging directory {}: {}", area.path().display(), e);
        }
        if let Some(run_log) = &self.run_log {
            if let Err(e) = std::fs::remove_file(run_log) {
                warn!("Could not remove run log {}: {}", run_log.display(), e);
            }
        }
        info!("Cleaned up.");
    }

    fn retain(&mut self) {
        let manager = RetentionManager::new(
            &self.spec.dest_dir,
            &self.spec.backup_name,
            self.compressor.extension(),
        );
        match manager.apply(self.spec.retention) {
            Ok(outcome) if !outcome.failed.is_empty() => {
                warn!("Retention left {} archive(s) it could not prune", outcome.failed.len())
            }
            Ok(_) => {}
            Err(e) => warn!("Could not apply retention in {}: {}", self.spec.dest_dir.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::TarZstd;
    use crate::staging::selector::tests::FakeProbe;
    use chrono::NaiveDate;
    use std::fs::{self, File};
    use tempfile::TempDir;

    const GIB: u64 = 1024 * 1024 * 1024;

    struct BrokenCompressor;

    impl Compressor for BrokenCompressor {
        fn extension(&self) -> &str {
            "7z"
        }

        fn compress(&self, _input_dir: &Path, _output: &Path, _preserve: bool) -> std::result::Result<(), CompressError> {
            Err(CompressError::Failed {
                status: "exit status: 2".to_string(),
                stderr: "fatal error".to_string(),
            })
        }
    }

    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> std::io::Result<Self> {
            let root = TempDir::new()?;
            fs::create_dir_all(root.path().join("data/sub"))?;
            fs::create_dir_all(root.path().join("backups"))?;
            fs::write(root.path().join("data/a.txt"), b"alpha")?;
            fs::write(root.path().join("data/sub/b.txt"), b"beta")?;
            Ok(Self { root })
        }

        fn path(&self, relative: &str) -> PathBuf {
            self.root.path().join(relative)
        }

        fn spec(&self, retention: usize) -> BackupSpec {
            BackupSpec {
                dest_dir: self.path("backups"),
                backup_name: "nightly".to_string(),
                sources: vec![self.path("data/a.txt"), self.path("data/sub")],
                retention,
                create_subdir: false,
                exclude: Vec::new(),
            }
        }

        fn run(&self, spec: BackupSpec, day: u32) -> BackupRun {
            BackupRun::new(spec, &Settings::default(), started(day))
                .with_compressor(Box::new(TarZstd::new(3)))
                .with_probe(Box::new(FakeProbe::uniform(100 * GIB)))
                .with_staging_candidates(vec![self.path("stage")])
        }

        fn archives(&self) -> std::io::Result<Vec<String>> {
            let mut names: Vec<String> = fs::read_dir(self.path("backups"))?
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|name| name.starts_with("nightly_"))
                .collect();
            names.sort();
            Ok(names)
        }
    }

    fn started(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap()
    }

    fn read_report(archive: &Path) -> std::io::Result<BackupReport> {
        let decoder = zstd::stream::read::Decoder::new(File::open(archive)?)?;
        let mut archive = tar::Archive::new(decoder);
        for entry in archive.entries()? {
            let entry = entry?;
            let is_report = entry
                .path()?
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("LocBkp_report_"))
                .unwrap_or(false);
            if is_report {
                return Ok(serde_json::from_reader(entry)?);
            }
        }
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no report in archive"))
    }

    #[test]
    fn test_end_to_end_run() -> crate::Result<()> {
        let fixture = Fixture::new()?;
        for day in 1..=3 {
            let old = archive_file_name("nightly", &started(day), "tar.zst");
            fs::write(fixture.path("backups").join(old), b"old")?;
        }

        let mut run = fixture.run(fixture.spec(3), 10);
        let outcome = run.execute()?;

        let expected = fixture.path("backups").join("nightly_10-06-2024_02.30.00.tar.zst");
        assert_eq!(outcome, RunOutcome::Completed { archive: expected.clone() });
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(run.state(), RunState::Done);

        let report = read_report(&expected)?;
        assert_eq!(report.locbkp_version, VERSION);
        assert_eq!(report.files_backed.len(), 2);
        assert!(!report.dirs_backed.is_empty());

        // The oldest archive made room for this run's
        let archives = fixture.archives()?;
        assert_eq!(archives.len(), 3);
        assert!(!archives.contains(&archive_file_name("nightly", &started(1), "tar.zst")));
        assert!(archives.contains(&"nightly_10-06-2024_02.30.00.tar.zst".to_string()));

        // Nothing left behind in staging
        assert_eq!(fs::read_dir(fixture.path("stage"))?.count(), 0);
        assert_eq!(run.stats().files_backed, 2);
        Ok(())
    }

    #[test]
    fn test_subdir_flag_wraps_archive_contents() -> crate::Result<()> {
        let fixture = Fixture::new()?;
        let mut spec = fixture.spec(5);
        spec.create_subdir = true;

        let outcome = fixture.run(spec, 11).execute()?;
        let RunOutcome::Completed { archive } = outcome else {
            panic!("expected an archive");
        };

        let decoder = zstd::stream::read::Decoder::new(File::open(&archive)?)?;
        let mut contents = tar::Archive::new(decoder);
        for entry in contents.entries()? {
            let path = entry?.path()?.into_owned();
            assert!(path.starts_with("nightly_11-06-2024_02.30.00"), "unexpected {}", path.display());
        }
        Ok(())
    }

    #[test]
    fn test_compression_failure_skips_transfer_and_retention() -> crate::Result<()> {
        let fixture = Fixture::new()?;
        for day in 1..=3 {
            fs::write(fixture.path("backups").join(archive_file_name("nightly", &started(day), "7z")), b"old")?;
        }
        let run_log = fixture.path("run.log");
        fs::write(&run_log, b"log")?;

        let mut run = fixture
            .run(fixture.spec(1), 12)
            .with_compressor(Box::new(BrokenCompressor))
            .with_run_log(run_log.clone());
        let outcome = run.execute()?;

        assert!(matches!(outcome, RunOutcome::NoArchive { .. }));
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(run.state(), RunState::Done);
        assert!(run.stats().size_before_mb > 0.0);
        assert_eq!(run.stats().compression_effectiveness(), None);
        // Retention did not run, so the old archives are still there
        assert_eq!(fixture.archives()?.len(), 3);
        assert_eq!(fs::read_dir(fixture.path("stage"))?.count(), 0);
        assert!(!run_log.exists());
        Ok(())
    }

    #[test]
    fn test_no_staging_root_is_fatal() -> crate::Result<()> {
        let fixture = Fixture::new()?;
        let mut run = fixture.run(fixture.spec(1), 13).with_probe(Box::new(FakeProbe::uniform(GIB / 2)));

        let result = run.execute();

        assert!(matches!(result, Err(crate::LocbkpError::NoStagingRoot { .. })));
        assert_eq!(run.state(), RunState::Init);
        assert!(fixture.archives()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_file_vanishing_after_enumeration() -> crate::Result<()> {
        let fixture = Fixture::new()?;
        let many = fixture.path("many");
        fs::create_dir(&many)?;
        for i in 0..10 {
            fs::write(many.join(format!("f{}.txt", i)), b"data")?;
        }
        let mut spec = fixture.spec(1);
        spec.sources = vec![many.clone()];

        let mut run = fixture.run(spec, 14);
        let area = StagingArea::create(&fixture.path("stage"), "partial")?;

        let lists = run.prepare();
        assert_eq!(lists.files.len(), 10);
        fs::remove_file(many.join("f3.txt"))?;
        let (files, dirs) = run.stage(&area, &lists);

        assert_eq!(files.len(), 9);
        assert_eq!(run.stats().files_backed, 9);

        run.compress(&area, &fixture.path("stage/partial.tar.zst"), &files, &dirs)
            .unwrap();
        let report = read_report(&fixture.path("stage/partial.tar.zst"))?;
        assert_eq!(report.files_backed.len(), 9);
        let vanished = many.join("f3.txt").to_string_lossy().into_owned();
        assert!(!report.files_backed.contains(&vanished));
        Ok(())
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(RunState::Init < RunState::Preparing);
        assert!(RunState::CleaningUp < RunState::Retaining);
        assert!(RunState::Retaining < RunState::Done);
        assert_eq!(RunState::CleaningUp.to_string(), "cleaning up");
    }
}
