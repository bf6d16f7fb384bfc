//! tar.gz archiving of local directories

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::Path;
use tar::Builder;
use tracing::debug;

/// Archive `source_dir` into `archive_path` as a gzipped tarball
///
/// Entries are stored under `root_name/` so the archive unpacks into a
/// single directory.
pub fn create_tar_gz(source_dir: &Path, archive_path: &Path, root_name: &str) -> Result<()> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive {:?}", archive_path))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    debug!("Archiving {:?} into {:?}", source_dir, archive_path);
    builder
        .append_dir_all(root_name, source_dir)
        .with_context(|| format!("Failed to archive {:?}", source_dir))?;

    let encoder = builder.into_inner().context("Failed to finish tar stream")?;
    encoder.finish().context("Failed to finish gzip stream")?;

    Ok(())
}

/// Whether a directory has no entries
pub fn is_empty_dir(dir: &Path) -> Result<bool> {
    Ok(fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {:?}", dir))?
        .next()
        .is_none())
}
