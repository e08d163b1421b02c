use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every way a backup run can fail. All variants are fatal to the run;
/// there is no retry at any layer.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("no automated snapshot found for instance {instance}")]
    NoSnapshotFound { instance: String },

    #[error("snapshot creation failed: {0}")]
    SnapshotCreationFailed(String),

    #[error("snapshot {snapshot} did not complete within {waited:?}")]
    SnapshotTimeout { snapshot: String, waited: Duration },

    #[error("snapshot identifier {id} does not match the automated naming scheme")]
    MalformedSnapshotId { id: String },

    #[error("restore from snapshot failed: {0}")]
    RestoreFailed(String),

    #[error("instance identifier {instance} is already in use")]
    InstanceNameCollision { instance: String },

    #[error("instance {instance} did not become available within {waited:?}")]
    AvailabilityTimeout { instance: String, waited: Duration },

    #[error("failed to attach security group: {0}")]
    SecurityGroupAttachFailed(String),

    #[error("dump artifact already exists: {}", path.display())]
    ArtifactAlreadyExists { path: PathBuf },

    #[error("unsupported database engine: {0}")]
    UnsupportedEngine(String),

    #[error("dump failed: {0}")]
    DumpFailed(String),

    #[error("teardown failed: {0}")]
    TeardownFailed(String),

    #[error("RDS API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
