//! Archive creation from the staging directory.
//!
//! The archiver is a narrow trait so the concrete tool can be swapped: an
//! external 7-Zip process or in-process tar + zstd. The archive extension is
//! owned by the compressor, since naming and retention both depend on it.

mod sevenzip;
mod tar_zstd;

pub use sevenzip::SevenZip;
pub use tar_zstd::TarZstd;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("archiver exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("I/O error while archiving: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive {} was not produced", .0.display())]
    MissingOutput(PathBuf),
}

pub trait Compressor {
    /// Archive file extension, without the leading dot
    fn extension(&self) -> &str;

    /// Pack `input_dir` into the archive at `output`.
    ///
    /// With `preserve_top_level_dir` the archive holds one folder named
    /// after `input_dir`; otherwise its contents sit at the archive root.
    fn compress(&self, input_dir: &Path, output: &Path, preserve_top_level_dir: bool) -> Result<(), CompressError>;
}
