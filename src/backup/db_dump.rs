// mongobackup/src/backup/db_dump.rs
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use which::which;

use crate::errors::{BackupError, Result};

// Helper function to find the dump executable
fn find_dump_executable(program: &Path) -> Result<PathBuf> {
    which(program).map_err(|e| {
        BackupError::DumpToolNotFound(format!(
            "{} ({}). Please ensure the MongoDB database tools are installed and in your PATH.",
            program.display(),
            e
        ))
    })
}

/// Runs `mongodump` for one database into `out_dir`.
///
/// The child is killed if it is still running when `limit` elapses. A
/// non-zero exit is reported with the tool's stderr as the message.
pub async fn dump_database(
    program: &Path,
    mongo_url: &str,
    db_name: &str,
    out_dir: &Path,
    limit: Duration,
) -> Result<()> {
    let dump_path = find_dump_executable(program)?;
    debug!("Using dump executable at {}", dump_path.display());

    let child = Command::new(&dump_path)
        .arg(format!("--uri={}", mongo_url))
        .arg(format!("--db={}", db_name))
        .arg(format!("--out={}", out_dir.display()))
        .arg("--quiet")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            return Err(BackupError::DumpTimeout { limit });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            return Err(BackupError::DumpFailed(format!(
                "{} exited with {}",
                program.display(),
                output.status
            )));
        }
        return Err(BackupError::DumpFailed(stderr));
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::backup::test_support::write_script;

    #[tokio::test]
    async fn test_successful_dump_writes_output() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let script = write_script(
            temp.path(),
            "fake_dump",
            r#"for arg in "$@"; do
  case "$arg" in
    --out=*) out="${arg#--out=}" ;;
    --db=*) db="${arg#--db=}" ;;
  esac
done
mkdir -p "$out/$db"
echo '{}' > "$out/$db/orders.bson"
"#,
        )?;
        let out = temp.path().join("dump");

        dump_database(&script, "mongodb://localhost", "gold_erp", &out, Duration::from_secs(10)).await?;

        assert!(out.join("gold_erp").join("orders.bson").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn test_nonzero_exit_uses_stderr() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let script = write_script(
            temp.path(),
            "failing_dump",
            "echo 'Failed: error connecting to db server' >&2\nexit 1\n",
        )?;

        let err = dump_database(
            &script,
            "mongodb://localhost",
            "gold_erp",
            &temp.path().join("dump"),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackupError::DumpFailed(_)));
        assert_eq!(err.to_string(), "Failed: error connecting to db server");
        Ok(())
    }

    #[tokio::test]
    async fn test_silent_failure_reports_status() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let script = write_script(temp.path(), "silent_dump", "exit 3\n")?;

        let err = dump_database(
            &script,
            "mongodb://localhost",
            "gold_erp",
            &temp.path().join("dump"),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        assert!(!err.to_string().is_empty());
        assert!(err.to_string().contains("exited with"));
        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_kills_dump() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let script = write_script(temp.path(), "slow_dump", "exec sleep 30\n")?;

        let started = std::time::Instant::now();
        let err = dump_database(
            &script,
            "mongodb://localhost",
            "gold_erp",
            &temp.path().join("dump"),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackupError::DumpTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = dump_database(
            Path::new("mongodump-definitely-not-installed"),
            "mongodb://localhost",
            "gold_erp",
            Path::new("/tmp/unused"),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BackupError::DumpToolNotFound(_)));
    }
}
