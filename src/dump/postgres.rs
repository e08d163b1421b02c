// snapdump/src/dump/postgres.rs
//! PostgreSQL-family dump: `pg_dump` in custom archive format.
//!
//! The password travels via `PGPASSFILE`, set on the child process only;
//! the parent environment is never mutated, so concurrent operations in
//! this process cannot observe the override.

use std::ffi::OsString;
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;
use which::which;

use super::{DumpRequest, create_artifact};
use crate::errors::{BackupError, Result};

fn pg_dump_args(request: &DumpRequest) -> Vec<OsString> {
    vec![
        "-Fc".into(),
        request.database.clone().into(),
        "-h".into(),
        request.host.clone().into(),
        "-p".into(),
        request.port.to_string().into(),
        "-U".into(),
        request.user.clone().into(),
        "-w".into(),
        "-f".into(),
        request.artifact_path.as_os_str().to_os_string(),
    ]
}

pub(super) async fn dump(request: &DumpRequest) -> Result<()> {
    // Pre-create with owner-only mode and exclusive semantics; pg_dump then
    // truncates and writes the same inode, keeping the mode.
    let artifact = create_artifact(&request.artifact_path)?;
    drop(artifact);

    let pg_dump_path = which("pg_dump")
        .map_err(|_| BackupError::DumpFailed("pg_dump not found in PATH".to_string()))?;

    info!(
        "dumping database {} from {}:{} with pg_dump, using {}",
        request.database,
        request.host,
        request.port,
        request.credential_file.display()
    );

    let status = Command::new(&pg_dump_path)
        .args(pg_dump_args(request))
        .env("PGPASSFILE", &request.credential_file)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| BackupError::DumpFailed(format!("failed to run pg_dump: {e}")))?;

    if !status.success() {
        return Err(BackupError::DumpFailed(format!(
            "pg_dump exited with {status}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rds::DbEngine;
    use std::path::PathBuf;

    #[test]
    fn test_pg_dump_args() {
        let request = DumpRequest {
            engine: DbEngine::Postgres,
            host: "restored.abc.us-east-1.rds.amazonaws.com".to_string(),
            port: 5432,
            user: "admin".to_string(),
            database: "orders".to_string(),
            artifact_path: PathBuf::from("orders-db/x.dump"),
            credential_file: PathBuf::from(".orders-db.pgpass"),
        };
        let args = pg_dump_args(&request);
        assert_eq!(
            args,
            vec![
                OsString::from("-Fc"),
                "orders".into(),
                "-h".into(),
                "restored.abc.us-east-1.rds.amazonaws.com".into(),
                "-p".into(),
                "5432".into(),
                "-U".into(),
                "admin".into(),
                "-w".into(),
                "-f".into(),
                "orders-db/x.dump".into(),
            ]
        );
    }
}
