//! Instance Provisioner: turns a resolved snapshot into a reachable
//! throwaway instance.
//!
//! Exposed to the workflow in separate phases rather than one call, because
//! the controller's cleanup obligation hinges on exactly when an instance
//! starts existing: a rejected restore request leaves nothing to tear down,
//! while any failure after `restore` returned `Ok` does.

use tracing::info;

use crate::errors::{BackupError, Result};
use crate::rds::wait::{WaitOutcome, WaitPolicy, wait_until};
use crate::rds::{DbEngine, RdsApi};
use crate::snapshot::SnapshotRef;

/// The throwaway instance once it is serving, with everything the dump
/// tools need to reach it.
#[derive(Debug, Clone)]
pub struct RestoredInstance {
    pub id: String,
    pub engine: DbEngine,
    pub host: String,
    pub port: u16,
    pub master_username: String,
}

/// Requests the restore. Returns once the service has accepted the request;
/// the instance exists (in `creating` state) from that point on.
pub async fn restore(
    api: &dyn RdsApi,
    snapshot: &SnapshotRef,
    instance_id: &str,
    billing_tag: &str,
) -> Result<()> {
    info!("restoring snapshot {} to instance {}", snapshot.id, instance_id);
    api.restore_instance_from_snapshot(&snapshot.id, instance_id, billing_tag)
        .await
        .map_err(|e| match e {
            BackupError::InstanceNameCollision { .. } => e,
            other => BackupError::RestoreFailed(other.to_string()),
        })
}

/// Blocks until the instance reports `available`.
pub async fn wait_available(api: &dyn RdsApi, instance_id: &str, policy: &WaitPolicy) -> Result<()> {
    info!("waiting for instance {} to become available", instance_id);
    let outcome = wait_until("instance", policy, || {
        let id = instance_id.to_string();
        async move { Ok(api.instance_status(&id).await? == "available") }
    })
    .await?;
    match outcome {
        WaitOutcome::Ready => Ok(()),
        WaitOutcome::TimedOut { waited } => Err(BackupError::AvailabilityTimeout {
            instance: instance_id.to_string(),
            waited,
        }),
    }
}

/// Fetches the instance descriptor and binds it to the derived identifier.
pub async fn describe(api: &dyn RdsApi, instance_id: &str) -> Result<RestoredInstance> {
    let descriptor = api.describe_instance(instance_id).await?;
    info!(
        "instance {} is serving {:?} at {}:{}",
        instance_id, descriptor.engine, descriptor.host, descriptor.port
    );
    Ok(RestoredInstance {
        id: instance_id.to_string(),
        engine: descriptor.engine,
        host: descriptor.host,
        port: descriptor.port,
        master_username: descriptor.master_username,
    })
}

/// Replaces the instance's VPC security group list with the supplied group,
/// so this host can reach the database port. Replacement is wholesale:
/// whatever groups the restore attached are dropped.
pub async fn attach_security_group(
    api: &dyn RdsApi,
    instance_id: &str,
    security_group: &str,
) -> Result<()> {
    info!(
        "attaching security group {} to instance {}",
        security_group, instance_id
    );
    api.set_security_groups(instance_id, &[security_group.to_string()])
        .await
        .map_err(|e| BackupError::SecurityGroupAttachFailed(e.to_string()))
}
