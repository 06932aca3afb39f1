pub(crate) mod archive;
pub(crate) mod db_dump;

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use crate::config::BackupConfig;
use crate::errors::{BackupError, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const ARCHIVE_PREFIX: &str = "backup_";
const ARCHIVE_SUFFIX: &str = ".tar.gz";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// Same shape as a `backup_*.tar.gz` glob.
static ARCHIVE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^backup_.*\.tar\.gz$").expect("archive name pattern is valid"));

/// Result record of a single `create_backup` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupReport {
    fn succeeded(file: String, size_mb: f64) -> Self {
        BackupReport {
            success: true,
            file: Some(file),
            size_mb: Some(size_mb),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        BackupReport {
            success: false,
            file: None,
            size_mb: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupEntry {
    pub file: String,
    pub size_mb: f64,
}

/// What a retention pass did. Never fatal.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    /// Names whose embedded timestamp could not be parsed.
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct BackupManager {
    config: BackupConfig,
}

impl BackupManager {
    pub fn new(config: BackupConfig) -> Self {
        BackupManager { config }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_dir
    }

    pub fn ensure_backup_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.config.backup_dir).with_context(|| {
            format!(
                "Failed to create backup directory: {}",
                self.config.backup_dir.display()
            )
        })
    }

    /// Dumps, archives and prunes. Every failure is folded into the
    /// returned report.
    pub async fn create_backup(&self) -> BackupReport {
        let name = format!("{}{}", ARCHIVE_PREFIX, Utc::now().format(TIMESTAMP_FORMAT));
        let dump_path = self.config.backup_dir.join(&name);
        let archive_path = self.config.backup_dir.join(format!("{}{}", name, ARCHIVE_SUFFIX));

        info!("Creating backup: {}", name);

        match self.dump_and_archive(&dump_path, &archive_path).await {
            Ok(size_mb) => {
                let file = format!("{}{}", name, ARCHIVE_SUFFIX);
                info!("Backup created: {} ({:.2} MB)", file, size_mb);

                let cleanup = self.cleanup_old_backups();
                if !cleanup.deleted.is_empty() || !cleanup.failed.is_empty() {
                    info!(
                        "Retention cleanup: {} deleted, {} failed",
                        cleanup.deleted.len(),
                        cleanup.failed.len()
                    );
                }
                if !cleanup.skipped.is_empty() {
                    debug!("Retention cleanup skipped {} archive(s)", cleanup.skipped.len());
                }

                BackupReport::succeeded(file, size_mb)
            }
            Err(e) => {
                error!("Backup failed: {}", e);
                remove_leftovers(&dump_path, &archive_path);
                BackupReport::failed(e.to_string())
            }
        }
    }

    async fn dump_and_archive(&self, dump_path: &Path, archive_path: &Path) -> Result<f64> {
        fs::create_dir_all(&self.config.backup_dir)?;

        db_dump::dump_database(
            &self.config.dump_program,
            &self.config.mongo_url,
            &self.config.db_name,
            dump_path,
            self.config.dump_timeout,
        )
        .await?;

        // mongodump writes nothing for an empty database
        fs::create_dir_all(dump_path)?;

        archive::create_tar_gz_archive(dump_path, archive_path)
            .map_err(|e| BackupError::Archive(format!("{:#}", e)))?;
        fs::remove_dir_all(dump_path)?;

        let size = fs::metadata(archive_path)?.len();
        Ok(size_in_mb(size))
    }

    /// Deletes archives whose embedded timestamp is older than the
    /// retention window.
    pub fn cleanup_old_backups(&self) -> CleanupReport {
        self.cleanup_before(Utc::now())
    }

    pub(crate) fn cleanup_before(&self, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(cutoff) = ChronoDuration::try_days(i64::from(self.config.retention_days))
            .and_then(|window| now.checked_sub_signed(window))
        else {
            warn!(
                "Retention window of {} days reaches past the earliest representable date; nothing has expired",
                self.config.retention_days
            );
            return report;
        };

        for path in self.archive_paths() {
            let Some(name) = file_name_of(&path) else {
                continue;
            };
            let Some(created_at) = parse_archive_timestamp(&name) else {
                debug!("Skipping backup with unparseable timestamp: {}", name);
                report.skipped.push(name);
                continue;
            };

            if created_at < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        info!("Deleted old backup: {}", name);
                        report.deleted.push(name);
                    }
                    Err(e) => {
                        warn!("Failed to delete old backup {}: {}", name, e);
                        report.failed.push((name, e.to_string()));
                    }
                }
            }
        }

        report
    }

    /// Existing archives, most recent first.
    pub fn list_backups(&self) -> Vec<BackupEntry> {
        let mut paths = self.archive_paths();
        paths.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

        paths
            .into_iter()
            .filter_map(|path| {
                let file = file_name_of(&path)?;
                let size = fs::metadata(&path).ok()?.len();
                Some(BackupEntry {
                    file,
                    size_mb: size_in_mb(size),
                })
            })
            .collect()
    }

    fn archive_paths(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.config.backup_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(
                    "Cannot read backup directory {}: {}",
                    self.config.backup_dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| {
                file_name_of(path).is_some_and(|name| ARCHIVE_NAME_PATTERN.is_match(&name))
            })
            .collect()
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}

/// `backup_20250101_020000.tar.gz` -> 2025-01-01T02:00:00Z
fn parse_archive_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name.strip_prefix(ARCHIVE_PREFIX)?.strip_suffix(ARCHIVE_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Megabytes rounded to 2 decimals; a non-empty file never rounds to zero.
fn size_in_mb(bytes: u64) -> f64 {
    let rounded = (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0;
    if bytes > 0 && rounded == 0.0 {
        0.01
    } else {
        rounded
    }
}

fn remove_leftovers(dump_path: &Path, archive_path: &Path) {
    if dump_path.exists() {
        if let Err(e) = fs::remove_dir_all(dump_path) {
            warn!("Failed to remove dump directory {}: {}", dump_path.display(), e);
        }
    }
    if archive_path.exists() {
        if let Err(e) = fs::remove_file(archive_path) {
            warn!("Failed to remove partial archive {}: {}", archive_path.display(), e);
        }
    }
}
