//! Snapshot Resolver: decides which snapshot the throwaway instance is
//! restored from.
//!
//! Two mutually exclusive modes, picked once per run: select the most recent
//! automated snapshot, or create a fresh on-demand one and wait for it to
//! complete.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::config::BackupRun;
use crate::errors::{BackupError, Result};
use crate::ident;
use crate::rds::RdsApi;
use crate::rds::wait::{WaitOutcome, WaitPolicy, wait_until};

/// The snapshot a run restores from, and whether this run created it
/// (created snapshots are teardown's responsibility unless the operator
/// asked to keep them).
#[derive(Debug, Clone)]
pub struct SnapshotRef {
    pub id: String,
    pub taken_at: NaiveDateTime,
    pub created_by_run: bool,
}

pub async fn resolve(api: &dyn RdsApi, run: &BackupRun) -> Result<SnapshotRef> {
    if run.fresh_snapshot {
        create_fresh(api, run, &WaitPolicy::SNAPSHOT).await
    } else {
        select_latest(api, &run.source_instance).await
    }
}

/// Picks the most recent automated snapshot of `source`.
///
/// Only identifiers carrying the `rds:{source}-` prefix are considered, so
/// snapshots of instances whose names merely contain `source` as a substring
/// never leak in. Under the fixed-width timestamp naming scheme the
/// lexicographic maximum is also the chronologically latest.
pub async fn select_latest(api: &dyn RdsApi, source: &str) -> Result<SnapshotRef> {
    info!("identifying automated snapshots of {}", source);
    let snapshots = api.list_automated_snapshots(source).await?;
    let prefix = ident::automated_snapshot_prefix(source);
    let latest = snapshots
        .into_iter()
        .filter(|id| id.starts_with(&prefix))
        .max()
        .ok_or_else(|| BackupError::NoSnapshotFound {
            instance: source.to_string(),
        })?;
    let taken_at = ident::parse_automated_snapshot_ts(source, &latest)?;
    info!("latest automated snapshot is {}", latest);
    Ok(SnapshotRef {
        id: latest,
        taken_at,
        created_by_run: false,
    })
}

/// Creates an on-demand snapshot and blocks until it completes.
///
/// On single-AZ sources snapshot creation can briefly stall writes on the
/// production instance; this mode is intended for multi-AZ sources only.
pub async fn create_fresh(
    api: &dyn RdsApi,
    run: &BackupRun,
    policy: &WaitPolicy,
) -> Result<SnapshotRef> {
    warn!("fresh-snapshot mode can briefly stall writes on single-AZ instances");
    let id = ident::fresh_snapshot_id(&run.source_instance, &run.started_at);
    info!("creating snapshot {} of {}", id, run.source_instance);
    api.create_snapshot(&run.source_instance, &id, &run.billing_tag)
        .await
        .map_err(|e| BackupError::SnapshotCreationFailed(e.to_string()))?;

    // Timeouts come back as an outcome; anything the probe itself returns
    // is a failure of the creation stage.
    let outcome = wait_until("snapshot", policy, || {
        let id = id.clone();
        async move { Ok(api.snapshot_status(&id).await? == "available") }
    })
    .await
    .map_err(|e| BackupError::SnapshotCreationFailed(e.to_string()))?;

    match outcome {
        WaitOutcome::Ready => Ok(SnapshotRef {
            taken_at: run.started_at,
            id,
            created_by_run: true,
        }),
        WaitOutcome::TimedOut { waited } => Err(BackupError::SnapshotTimeout {
            snapshot: id,
            waited,
        }),
    }
}
