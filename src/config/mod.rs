// mongobackup/src/config/mod.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{BackupError, Result};

pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DUMP_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_DUMP_PROGRAM: &str = "mongodump";

const BACKUP_DIR_NAME: &str = "backups";
const LOG_DIR_NAME: &str = "logs";
const LOG_FILE_NAME: &str = "mongodb_backup.log";

/// Process-wide settings, read once at startup and handed to the
/// `BackupManager`.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub mongo_url: String,
    pub db_name: String,
    pub retention_days: u32,
    pub backup_dir: PathBuf,
    pub log_file: PathBuf,
    /// False on read-only deployments (`RENDER` set): console logging only.
    pub file_logging: bool,
    pub dump_program: PathBuf,
    pub dump_timeout: Duration,
}

impl BackupConfig {
    /// Loads `<base_dir>/.env` when present, then reads the process
    /// environment. Variables already set in the environment take precedence.
    pub fn load_from_env(base_dir: &Path) -> Result<Self> {
        let env_path = base_dir.join(".env");
        if env_path.is_file() {
            dotenv::from_path(&env_path).map_err(|e| {
                BackupError::Config(format!("Failed to load {}: {}", env_path.display(), e))
            })?;
        }

        Self::from_lookup(base_dir, |key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Touches
    /// nothing on disk.
    pub fn from_lookup<F>(base_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    BackupError::Config("Missing required env vars: MONGO_URL or DB_NAME".to_string())
                })
        };

        let mongo_url = required("MONGO_URL")?;
        let db_name = required("DB_NAME")?;

        let retention_days = match lookup("BACKUP_RETENTION_DAYS") {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<u32>().map_err(|e| {
                BackupError::Config(format!(
                    "BACKUP_RETENTION_DAYS must be a non-negative integer, got '{}': {}",
                    raw, e
                ))
            })?,
            _ => DEFAULT_RETENTION_DAYS,
        };

        let dump_program = lookup("MONGODUMP_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_PROGRAM));

        Ok(BackupConfig {
            mongo_url,
            db_name,
            retention_days,
            backup_dir: base_dir.join(BACKUP_DIR_NAME),
            log_file: base_dir.join(LOG_DIR_NAME).join(LOG_FILE_NAME),
            file_logging: lookup("RENDER").is_none(),
            dump_program,
            dump_timeout: DUMP_TIMEOUT,
        })
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_file.parent()
    }
}
