//! The seam between the workflow and the cloud database service.
//!
//! The workflow only ever talks to [`RdsApi`]; `aws.rs` implements it against
//! the real SDK and the test suite substitutes an in-memory fake.

pub mod aws;
pub mod wait;

use async_trait::async_trait;

use crate::errors::Result;

/// The closed set of engine families this tool knows how to dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbEngine {
    Mysql,
    Postgres,
}

impl DbEngine {
    /// Maps the engine string reported by the service onto an engine family.
    pub fn from_engine_name(name: &str) -> Option<Self> {
        match name {
            "mysql" | "mariadb" | "aurora" | "aurora-mysql" => Some(Self::Mysql),
            "postgres" | "aurora-postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// File extension of the dump artifact this engine family produces.
    pub fn artifact_extension(self) -> &'static str {
        match self {
            Self::Mysql => "sql.xz",
            Self::Postgres => "dump",
        }
    }
}

/// Connection metadata of a running instance, as reported by the service.
#[derive(Debug, Clone)]
pub struct InstanceDescriptor {
    pub engine: DbEngine,
    pub host: String,
    pub port: u16,
    pub master_username: String,
}

/// Operations consumed from the cloud database service.
///
/// Status probes return the raw status string; callers decide what counts as
/// ready. Deletions are fire-and-request: the call returns once the service
/// accepts it, not once the resource is gone.
#[async_trait]
pub trait RdsApi: Send + Sync {
    /// Identifiers of all automated snapshots of `instance`.
    async fn list_automated_snapshots(&self, instance: &str) -> Result<Vec<String>>;

    /// Requests an on-demand snapshot of `instance`, tagged for billing.
    async fn create_snapshot(&self, instance: &str, snapshot: &str, billing_tag: &str)
        -> Result<()>;

    async fn snapshot_status(&self, snapshot: &str) -> Result<String>;

    /// Requests a restore of `snapshot` into a new instance named `instance`,
    /// tagged for billing and with tag propagation to byproduct snapshots.
    async fn restore_instance_from_snapshot(
        &self,
        snapshot: &str,
        instance: &str,
        billing_tag: &str,
    ) -> Result<()>;

    async fn instance_status(&self, instance: &str) -> Result<String>;

    async fn describe_instance(&self, instance: &str) -> Result<InstanceDescriptor>;

    /// Replaces (not merges) the instance's VPC security group list.
    async fn set_security_groups(&self, instance: &str, groups: &[String]) -> Result<()>;

    /// Deletes the instance, skipping any final snapshot.
    async fn delete_instance(&self, instance: &str) -> Result<()>;

    async fn delete_snapshot(&self, snapshot: &str) -> Result<()>;
}
