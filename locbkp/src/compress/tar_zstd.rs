//! In-process tar archive compressed with zstd.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{CompressError, Compressor};

#[derive(Debug, Clone)]
pub struct TarZstd {
    level: i32,
}

impl TarZstd {
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(1, 22),
        }
    }
}

impl Compressor for TarZstd {
    fn extension(&self) -> &str {
        "tar.zst"
    }

    fn compress(&self, input_dir: &Path, output: &Path, preserve_top_level_dir: bool) -> Result<(), CompressError> {
        info!("Packing {} into {} (zstd level {})", input_dir.display(), output.display(), self.level);

        let archive_root = if preserve_top_level_dir {
            input_dir
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("backup"))
        } else {
            PathBuf::new()
        };

        let file = File::create(output)?;
        let encoder = zstd::stream::write::Encoder::new(file, self.level)?;
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir_all(&archive_root, input_dir)?;

        let encoder = builder.into_inner()?;
        let file = encoder.finish()?;
        file.sync_all()?;

        Ok(())
    }
}
