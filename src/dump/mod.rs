//! Dump Executor: extracts one logical dump from the restored instance.
//!
//! Dispatches on engine family. Both paths create the artifact exclusively
//! (owner-only mode, refusing to overwrite) before any subprocess runs, and
//! feed the native tool its password through a credential file rather than
//! argv or inherited environment.

pub(crate) mod mysql;
pub(crate) mod postgres;

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::{BackupError, Result};
use crate::rds::DbEngine;

/// Everything a dump invocation needs, resolved by the workflow.
#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub engine: DbEngine,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub artifact_path: PathBuf,
    pub credential_file: PathBuf,
}

/// Seam for the dump stage, so the workflow's cleanup behavior can be
/// exercised without the native tools installed.
#[async_trait]
pub trait DumpExecutor: Send + Sync {
    async fn dump(&self, request: &DumpRequest) -> Result<()>;
}

/// Runs the real engine-native tools found on `PATH`.
pub struct ShellDumper;

#[async_trait]
impl DumpExecutor for ShellDumper {
    async fn dump(&self, request: &DumpRequest) -> Result<()> {
        match request.engine {
            DbEngine::Mysql => mysql::dump(request).await,
            DbEngine::Postgres => postgres::dump(request).await,
        }
    }
}

/// Artifact location: a per-source-instance directory holding one file per
/// restored instance, e.g. `orders-db/orders-db-...-fromsnap-....sql.xz`.
pub fn artifact_path(
    output_root: &Path,
    source: &str,
    restored_id: &str,
    engine: DbEngine,
) -> PathBuf {
    output_root
        .join(source)
        .join(format!("{}.{}", restored_id, engine.artifact_extension()))
}

/// Creates the artifact file exclusively, owner-readable/writable only.
///
/// The parent directory is created lazily and tolerates pre-existence; the
/// file itself must not already exist, so a rerun can never clobber a prior
/// dump.
pub fn create_artifact(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            BackupError::ArtifactAlreadyExists {
                path: path.to_path_buf(),
            }
        } else {
            BackupError::Io(e)
        }
    })
}
