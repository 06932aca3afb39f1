//! MongoDB backup manager
//!
//! Creates, prunes and lists compressed `mongodump` backups from the command line

// mongobackup/src/main.rs
mod backup;
mod config;
mod errors;
mod logging;

use anyhow::{Context, Result};
use backup::BackupManager;
use config::BackupConfig;
use serde::Serialize;
use std::env;
use std::process::ExitCode;

const USAGE: &str = "Usage: mongobackup [backup|list]";

#[derive(Debug, PartialEq)]
enum Command {
    Backup,
    List,
}

impl Command {
    /// No argument means `backup`. Anything unrecognised comes back as `Err`.
    fn parse(arg: Option<&str>) -> std::result::Result<Self, String> {
        match arg {
            None | Some("backup") => Ok(Command::Backup),
            Some("list") => Ok(Command::List),
            Some(other) => Err(other.to_string()),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<ExitCode> {
    let base_dir = env::current_dir().context("Failed to resolve the working directory")?;
    let config = BackupConfig::load_from_env(&base_dir)
        .context("Failed to load configuration")?;

    let args: Vec<String> = env::args().collect();
    let command = match Command::parse(args.get(1).map(String::as_str)) {
        Ok(command) => command,
        Err(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("{}", USAGE);
            return Ok(ExitCode::FAILURE);
        }
    };

    logging::init_logging(&config)?;
    let manager = BackupManager::new(config);
    manager.ensure_backup_dir()?;
    tracing::debug!("Backup directory: {}", manager.backup_dir().display());

    match command {
        Command::Backup => print_json(&manager.create_backup().await)?,
        Command::List => print_json(&manager.list_backups())?,
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render result as JSON")?;
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse(None), Ok(Command::Backup));
        assert_eq!(Command::parse(Some("backup")), Ok(Command::Backup));
        assert_eq!(Command::parse(Some("list")), Ok(Command::List));
        assert_eq!(Command::parse(Some(" list ")), Err(" list ".to_string()));
        assert_eq!(Command::parse(Some("restore")), Err("restore".to_string()));
    }
}
