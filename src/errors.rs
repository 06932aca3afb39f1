use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dump tool not found: {0}")]
    DumpToolNotFound(String),

    #[error("{0}")]
    DumpFailed(String),

    #[error("Dump timed out after {limit:?}")]
    DumpTimeout { limit: std::time::Duration },

    #[error("Archive error: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;
