// mongobackup/src/backup/archive.rs
use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;
use tar::Builder;
use tracing::debug;
use walkdir::WalkDir;

/// Creates a GZipped TAR archive from a dump directory.
///
/// Entry paths are relative to `source_dir`, so the archive unpacks to the
/// dump's contents rather than to a wrapping directory.
///
/// # Arguments
/// * `source_dir` - The dump directory whose contents will be archived.
/// * `archive_dest_path` - The full path where the `.tar.gz` archive will be created.
pub fn create_tar_gz_archive(source_dir: &Path, archive_dest_path: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        anyhow::bail!(
            "Source for archival is not a directory: {}",
            source_dir.display()
        );
    }

    debug!(
        "Creating tar.gz archive from {} to {}",
        source_dir.display(),
        archive_dest_path.display()
    );

    let archive_file = File::create(archive_dest_path).with_context(|| {
        format!(
            "Failed to create archive file: {}",
            archive_dest_path.display()
        )
    })?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut tar_builder = Builder::new(enc);

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry
            .with_context(|| format!("Failed to walk directory: {}", source_dir.display()))?;
        let path = entry.path();
        let name = path.strip_prefix(source_dir).with_context(|| {
            format!(
                "Failed to strip prefix {} from {}",
                source_dir.display(),
                path.display()
            )
        })?;

        if name.as_os_str().is_empty() {
            continue;
        }

        if entry.file_type().is_dir() {
            tar_builder
                .append_dir(name, path)
                .with_context(|| format!("Failed to append directory {} to archive", path.display()))?;
        } else if entry.file_type().is_file() {
            tar_builder.append_path_with_name(path, name).with_context(|| {
                format!(
                    "Failed to append file {} as {} to archive",
                    path.display(),
                    name.display()
                )
            })?;
        }
    }

    let encoder = tar_builder.into_inner().with_context(|| {
        format!(
            "Failed to finish tar stream for archive: {}",
            archive_dest_path.display()
        )
    })?;

    let file = encoder.finish().with_context(|| {
        format!(
            "Failed to finish Gzip encoding for archive: {}",
            archive_dest_path.display()
        )
    })?;
    file.sync_all()
        .with_context(|| format!("Failed to flush archive: {}", archive_dest_path.display()))?;

    Ok(())
}
