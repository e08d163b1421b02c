//! Workflow Controller: the state machine sequencing the five irreversible
//! cloud lifecycle steps, and the Teardown that must follow any run in which
//! a throwaway instance came to exist.
//!
//! Transitions are attempted exactly once; the first error aborts forward
//! progress. There is no resumption across process restarts: a run killed
//! mid-wait leaves orphaned cloud resources to be cleaned up out-of-band.

use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::config::BackupRun;
use crate::dump::{self, DumpExecutor, DumpRequest};
use crate::errors::{BackupError, Result};
use crate::ident;
use crate::provision;
use crate::rds::RdsApi;
use crate::rds::wait::WaitPolicy;
use crate::snapshot::{self, SnapshotRef};

/// Progress of a run. `Failed` is implicit: any error leaves the run in
/// whatever state it last reached, which decides the cleanup obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Init,
    SnapshotResolved,
    InstanceRestored,
    InstanceAvailable,
    SecurityGroupAttached,
    Dumped,
    TornDown,
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunReport {
    pub restored_instance: String,
    pub artifact: PathBuf,
}

/// Runs one complete backup: resolve snapshot, restore, dump, tear down.
///
/// Once the restore request has been accepted the throwaway instance exists,
/// and teardown runs no matter what happens afterwards. A teardown failure
/// after another error is logged but never masks the original error.
pub async fn run(
    api: &dyn RdsApi,
    dumper: &dyn DumpExecutor,
    run: &BackupRun,
) -> Result<RunReport> {
    let mut state = RunState::Init;
    debug!("run state: {:?}", state);

    let snapshot = snapshot::resolve(api, run).await?;
    state = RunState::SnapshotResolved;
    debug!("run state: {:?}", state);

    let instance_id =
        ident::restored_instance_id(&run.source_instance, &run.started_at, &snapshot.taken_at);

    // A rejected restore means no instance was created: nothing to clean up.
    provision::restore(api, &snapshot, &instance_id, &run.billing_tag).await?;
    state = RunState::InstanceRestored;
    debug!("run state: {:?}", state);

    let outcome = dump_from_instance(api, dumper, run, &instance_id, &mut state).await;

    let teardown_outcome = teardown(api, run, &snapshot, &instance_id).await;
    match (outcome, teardown_outcome) {
        (Ok(report), Ok(())) => {
            state = RunState::TornDown;
            debug!("run state: {:?}", state);
            Ok(report)
        }
        (Ok(_), Err(teardown_err)) => Err(teardown_err),
        (Err(run_err), Ok(())) => Err(run_err),
        (Err(run_err), Err(teardown_err)) => {
            // Surface both; the run error is the one callers act on.
            error!("teardown also failed: {}", teardown_err);
            Err(run_err)
        }
    }
}

/// Everything between the restore request and the finished dump. Split out
/// so `run` can interpose teardown on any error in this stretch.
async fn dump_from_instance(
    api: &dyn RdsApi,
    dumper: &dyn DumpExecutor,
    run: &BackupRun,
    instance_id: &str,
    state: &mut RunState,
) -> Result<RunReport> {
    provision::wait_available(api, instance_id, &WaitPolicy::INSTANCE).await?;
    *state = RunState::InstanceAvailable;
    debug!("run state: {:?}", state);

    let instance = provision::describe(api, instance_id).await?;

    provision::attach_security_group(api, instance_id, &run.security_group).await?;
    *state = RunState::SecurityGroupAttached;
    debug!("run state: {:?}", state);

    let artifact = dump::artifact_path(
        &run.output_root,
        &run.source_instance,
        instance_id,
        instance.engine,
    );
    let request = DumpRequest {
        engine: instance.engine,
        host: instance.host,
        port: instance.port,
        user: instance.master_username,
        database: run.database.clone(),
        artifact_path: artifact.clone(),
        credential_file: run.credential_file(instance.engine),
    };
    dumper.dump(&request).await?;
    *state = RunState::Dumped;
    debug!("run state: {:?}", state);

    Ok(RunReport {
        restored_instance: instance_id.to_string(),
        artifact,
    })
}

/// Deletes the throwaway instance (skipping any final snapshot), then the
/// on-demand snapshot if this run created one and the operator did not ask
/// to keep it. Both deletions are fire-and-request. A failed dump leaves
/// its partial artifact in place for inspection; teardown only touches
/// cloud resources.
async fn teardown(
    api: &dyn RdsApi,
    run: &BackupRun,
    snapshot: &SnapshotRef,
    instance_id: &str,
) -> Result<()> {
    info!("deleting instance {}", instance_id);
    api.delete_instance(instance_id)
        .await
        .map_err(|e| BackupError::TeardownFailed(format!("delete instance {instance_id}: {e}")))?;

    if snapshot.created_by_run {
        if run.keep_fresh_snapshot {
            info!("keeping snapshot {} as requested", snapshot.id);
        } else {
            info!("deleting snapshot {}", snapshot.id);
            api.delete_snapshot(&snapshot.id).await.map_err(|e| {
                BackupError::TeardownFailed(format!("delete snapshot {}: {e}", snapshot.id))
            })?;
        }
    }
    Ok(())
}
