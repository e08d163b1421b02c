//! Deterministic naming for the resources a run creates.
//!
//! Every derived name embeds the run timestamp to second precision, so two
//! runs started against the same snapshot in the same second will collide on
//! the instance identifier. That is an accepted limitation: RDS rejects the
//! duplicate and the run fails with `InstanceNameCollision` rather than this
//! module inventing a tie-breaker.

use chrono::NaiveDateTime;

use crate::errors::{BackupError, Result};

/// Second-precision, fixed-width, lexicographically sortable timestamp form
/// used in derived identifiers, e.g. `20240102000000`.
pub const ID_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Naming scheme of RDS automated snapshots, minus the instance prefix.
/// Automated snapshots only carry minute precision.
const AUTOMATED_SNAPSHOT_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Identifier of the throwaway instance restored from a snapshot:
/// `{source}-{runTS}-fromsnap-{snapTS}`.
///
/// Pure function of its inputs; the `fromsnap` segment keeps the instance
/// traceable back to the snapshot it was restored from.
pub fn restored_instance_id(
    source: &str,
    run_ts: &NaiveDateTime,
    snapshot_ts: &NaiveDateTime,
) -> String {
    format!(
        "{}-{}-fromsnap-{}",
        source,
        run_ts.format(ID_TIMESTAMP_FORMAT),
        snapshot_ts.format(ID_TIMESTAMP_FORMAT),
    )
}

/// Identifier for an on-demand snapshot created by this run.
pub fn fresh_snapshot_id(source: &str, run_ts: &NaiveDateTime) -> String {
    format!("{}-snap-{}", source, run_ts.format(ID_TIMESTAMP_FORMAT))
}

/// Prefix every automated snapshot of `source` carries. Used to filter out
/// snapshots of unrelated instances that merely contain the name as a
/// substring.
pub fn automated_snapshot_prefix(source: &str) -> String {
    format!("rds:{source}-")
}

/// Extracts the creation timestamp embedded in an automated snapshot
/// identifier (`rds:{source}-YYYY-MM-DD-HH-MM`).
pub fn parse_automated_snapshot_ts(source: &str, snapshot_id: &str) -> Result<NaiveDateTime> {
    let prefix = automated_snapshot_prefix(source);
    let rest = snapshot_id
        .strip_prefix(&prefix)
        .ok_or_else(|| BackupError::MalformedSnapshotId {
            id: snapshot_id.to_string(),
        })?;
    NaiveDateTime::parse_from_str(rest, AUTOMATED_SNAPSHOT_FORMAT).map_err(|_| {
        BackupError::MalformedSnapshotId {
            id: snapshot_id.to_string(),
        }
    })
}
