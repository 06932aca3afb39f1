// mongobackup/src/logging.rs
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::BackupConfig;

type FileLayer<S> = fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, Mutex<File>>;

/// Installs the global subscriber: stderr always, plus an append-only log
/// file unless file logging is disabled.
pub fn init_logging(config: &BackupConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer(config)?)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Opens the log file for appending. Returns `None` without touching the
/// filesystem when file logging is off.
fn file_layer<S>(config: &BackupConfig) -> Result<Option<FileLayer<S>>> {
    if !config.file_logging {
        return Ok(None);
    }

    if let Some(log_dir) = config.log_dir() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file: {}", config.log_file.display()))?;

    Ok(Some(
        fmt::layer()
            .with_writer(Mutex::new(log_file))
            .with_ansi(false)
            .with_target(false),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tracing_subscriber::Registry;

    fn test_config(base: &Path, file_logging: bool) -> BackupConfig {
        BackupConfig {
            mongo_url: "mongodb://localhost:27017".to_string(),
            db_name: "gold_erp".to_string(),
            retention_days: 7,
            backup_dir: base.join("backups"),
            log_file: base.join("logs").join("mongodb_backup.log"),
            file_logging,
            dump_program: "mongodump".into(),
            dump_timeout: Duration::from_secs(10),
        }
    }

    fn log_through_file_layer(config: &BackupConfig, message: &str) -> anyhow::Result<()> {
        let layer = file_layer::<Registry>(config)?.context("file layer expected")?;
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || tracing::info!("{}", message));
        Ok(())
    }

    #[test]
    fn test_file_logging_disabled_leaves_no_log_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = test_config(temp.path(), false);

        let layer = file_layer::<Registry>(&config)?;

        assert!(layer.is_none());
        assert!(!temp.path().join("logs").exists());
        Ok(())
    }

    #[test]
    fn test_file_logging_appends_to_log_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = test_config(temp.path(), true);

        log_through_file_layer(&config, "Backup created: first")?;
        log_through_file_layer(&config, "Backup created: second")?;

        let contents = fs::read_to_string(&config.log_file)?;
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("Backup created: first"));
        assert!(lines[1].contains("Backup created: second"));
        assert!(!contents.contains('\u{1b}'));
        Ok(())
    }
}
