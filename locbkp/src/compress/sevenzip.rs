//! 7-Zip archiver, run as an external process.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

use super::{CompressError, Compressor};
use crate::fs::paths::absolutize;

#[derive(Debug, Clone)]
pub struct SevenZip {
    binary: PathBuf,
    level: i32,
}

impl SevenZip {
    pub fn new(binary: PathBuf, level: i32) -> Self {
        Self {
            binary,
            level: level.clamp(0, 9),
        }
    }

    fn command(&self, input_dir: &Path, output: &Path, preserve_top_level_dir: bool) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("a")
            .arg("-t7z")
            .arg(output)
            .arg(format!("-mx{}", self.level))
            .arg("-aoa");

        if preserve_top_level_dir {
            cmd.arg(input_dir);
        } else {
            // 7-Zip expands the wildcard itself, relative to the working directory
            cmd.current_dir(input_dir).arg("*");
        }

        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
        cmd
    }
}

impl Compressor for SevenZip {
    fn extension(&self) -> &str {
        "7z"
    }

    fn compress(&self, input_dir: &Path, output: &Path, preserve_top_level_dir: bool) -> Result<(), CompressError> {
        let output = absolutize(output)?;
        let mut cmd = self.command(input_dir, &output, preserve_top_level_dir);
        info!("Executing: {:?}", cmd);

        let result = cmd.output().map_err(|source| CompressError::Spawn {
            program: self.binary.display().to_string(),
            source,
        })?;

        if !result.status.success() {
            return Err(CompressError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.is_file() {
            return Err(CompressError::MissingOutput(output));
        }

        Ok(())
    }
}
