//! End-to-end workflow scenarios against an in-memory RDS fake.
//!
//! The fake records every lifecycle call so the tests can assert not just
//! the outcome of a run but exactly which cloud resources it touched.
//! In particular, teardown must run precisely when a throwaway instance
//! exists, and never otherwise.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;

use snapdump::config::BackupRun;
use snapdump::dump::{DumpExecutor, DumpRequest};
use snapdump::errors::{BackupError, Result};
use snapdump::rds::wait::WaitPolicy;
use snapdump::rds::{DbEngine, InstanceDescriptor, RdsApi};
use snapdump::snapshot;
use snapdump::workflow;

const RUN_TS: &str = "20240315103045";

fn run_started_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(10, 30, 45)
        .unwrap()
}

fn backup_run(output_root: &Path) -> BackupRun {
    BackupRun {
        source_instance: "orders-db".to_string(),
        database: "orders".to_string(),
        security_group: "sg-0123456789abcdef0".to_string(),
        billing_tag: "backups".to_string(),
        fresh_snapshot: false,
        keep_fresh_snapshot: false,
        credential_profile: "orders-db".to_string(),
        output_root: output_root.to_path_buf(),
        credentials_dir: PathBuf::from("."),
        started_at: run_started_at(),
    }
}

struct FakeRds {
    snapshots: Vec<String>,
    engine: &'static str,
    reject_restore: bool,
    collide_restore: bool,
    fail_snapshot_status: bool,
    fail_delete_instance: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeRds {
    fn with_snapshots(snapshots: &[&str]) -> Self {
        FakeRds {
            snapshots: snapshots.iter().map(|s| s.to_string()).collect(),
            engine: "mysql",
            reject_restore: false,
            collide_restore: false,
            fail_snapshot_status: false,
            fail_delete_instance: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl RdsApi for FakeRds {
    async fn list_automated_snapshots(&self, instance: &str) -> Result<Vec<String>> {
        self.record(format!("list_automated_snapshots:{instance}"));
        Ok(self.snapshots.clone())
    }

    async fn create_snapshot(
        &self,
        instance: &str,
        snapshot: &str,
        billing_tag: &str,
    ) -> Result<()> {
        self.record(format!("create_snapshot:{instance}:{snapshot}:{billing_tag}"));
        Ok(())
    }

    async fn snapshot_status(&self, snapshot: &str) -> Result<String> {
        self.record(format!("snapshot_status:{snapshot}"));
        if self.fail_snapshot_status {
            return Err(BackupError::Api("status probe refused".to_string()));
        }
        Ok("available".to_string())
    }

    async fn restore_instance_from_snapshot(
        &self,
        snapshot: &str,
        instance: &str,
        billing_tag: &str,
    ) -> Result<()> {
        self.record(format!("restore:{snapshot}:{instance}:{billing_tag}"));
        if self.collide_restore {
            return Err(BackupError::InstanceNameCollision {
                instance: instance.to_string(),
            });
        }
        if self.reject_restore {
            return Err(BackupError::Api("service rejected the restore".to_string()));
        }
        Ok(())
    }

    async fn instance_status(&self, instance: &str) -> Result<String> {
        self.record(format!("instance_status:{instance}"));
        Ok("available".to_string())
    }

    async fn describe_instance(&self, instance: &str) -> Result<InstanceDescriptor> {
        self.record(format!("describe_instance:{instance}"));
        let engine = DbEngine::from_engine_name(self.engine).unwrap();
        Ok(InstanceDescriptor {
            engine,
            host: "restored.abc.us-east-1.rds.amazonaws.com".to_string(),
            port: match engine {
                DbEngine::Mysql => 3306,
                DbEngine::Postgres => 5432,
            },
            master_username: "admin".to_string(),
        })
    }

    async fn set_security_groups(&self, instance: &str, groups: &[String]) -> Result<()> {
        self.record(format!("set_security_groups:{instance}:{}", groups.join(",")));
        Ok(())
    }

    async fn delete_instance(&self, instance: &str) -> Result<()> {
        self.record(format!("delete_instance:{instance}"));
        if self.fail_delete_instance {
            return Err(BackupError::Api("deletion rejected".to_string()));
        }
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot: &str) -> Result<()> {
        self.record(format!("delete_snapshot:{snapshot}"));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDumper {
    requests: Mutex<Vec<DumpRequest>>,
    fail: bool,
}

impl RecordingDumper {
    fn failing() -> Self {
        RecordingDumper {
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn requests(&self) -> Vec<DumpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DumpExecutor for RecordingDumper {
    async fn dump(&self, request: &DumpRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(BackupError::DumpFailed(
                "mysqldump exited with exit status: 2".to_string(),
            ));
        }
        Ok(())
    }
}

fn orders_db_fake() -> FakeRds {
    FakeRds::with_snapshots(&[
        "rds:orders-db-2024-01-01-00-00",
        "rds:orders-db-2024-01-02-00-00",
    ])
}

#[tokio::test]
async fn test_selects_latest_snapshot_and_derives_instance_id() {
    let out = tempdir().unwrap();
    let api = orders_db_fake();
    let dumper = RecordingDumper::default();

    let report = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap();

    let expected_id = format!("orders-db-{RUN_TS}-fromsnap-20240102000000");
    assert_eq!(report.restored_instance, expected_id);
    assert!(
        api.calls()
            .iter()
            .any(|c| c == &format!("restore:rds:orders-db-2024-01-02-00-00:{expected_id}:backups"))
    );
}

#[tokio::test]
async fn test_resolver_ignores_foreign_prefixes() {
    let api = FakeRds::with_snapshots(&[
        "rds:orders-db-2024-01-01-00-00",
        "rds:other-db-2024-06-01-00-00",
        "manual-orders-db-copy",
    ]);

    let snapshot = snapshot::select_latest(&api, "orders-db").await.unwrap();
    assert_eq!(snapshot.id, "rds:orders-db-2024-01-01-00-00");
    assert!(!snapshot.created_by_run);
}

#[tokio::test]
async fn test_resolver_fails_on_empty_matching_set() {
    let api = FakeRds::with_snapshots(&["rds:other-db-2024-06-01-00-00"]);

    let err = snapshot::select_latest(&api, "orders-db").await.unwrap_err();
    assert!(matches!(err, BackupError::NoSnapshotFound { instance } if instance == "orders-db"));
}

#[tokio::test]
async fn test_mysql_dump_request_shape() {
    let out = tempdir().unwrap();
    let api = orders_db_fake();
    let dumper = RecordingDumper::default();

    let report = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap();

    let requests = dumper.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.engine, DbEngine::Mysql);
    assert_eq!(request.database, "orders");
    assert_eq!(request.user, "admin");
    assert_eq!(request.port, 3306);
    assert_eq!(
        request.artifact_path,
        out.path()
            .join("orders-db")
            .join(format!("orders-db-{RUN_TS}-fromsnap-20240102000000.sql.xz"))
    );
    assert_eq!(request.credential_file, Path::new("./.orders-db.my.cnf"));
    assert_eq!(report.artifact, request.artifact_path);
}

#[tokio::test]
async fn test_postgres_dump_request_shape() {
    let out = tempdir().unwrap();
    let mut api = orders_db_fake();
    api.engine = "postgres";
    let dumper = RecordingDumper::default();

    workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap();

    let requests = dumper.requests();
    assert_eq!(requests[0].engine, DbEngine::Postgres);
    assert_eq!(requests[0].port, 5432);
    assert!(
        requests[0]
            .artifact_path
            .to_string_lossy()
            .ends_with(".dump")
    );
    assert_eq!(requests[0].credential_file, Path::new("./.orders-db.pgpass"));
}

#[tokio::test]
async fn test_rejected_restore_skips_teardown() {
    let out = tempdir().unwrap();
    let mut api = orders_db_fake();
    api.reject_restore = true;
    let dumper = RecordingDumper::default();

    let err = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::RestoreFailed(_)));
    assert_eq!(api.count("delete_instance"), 0);
    assert_eq!(api.count("delete_snapshot"), 0);
    assert!(dumper.requests().is_empty());
}

#[tokio::test]
async fn test_name_collision_surfaces_without_teardown() {
    let out = tempdir().unwrap();
    let mut api = orders_db_fake();
    api.collide_restore = true;
    let dumper = RecordingDumper::default();

    let err = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::InstanceNameCollision { .. }));
    assert_eq!(api.count("delete_instance"), 0);
}

#[tokio::test]
async fn test_failed_dump_still_tears_down_instance() {
    let out = tempdir().unwrap();
    let api = orders_db_fake();
    let dumper = RecordingDumper::failing();

    let err = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::DumpFailed(_)));
    assert_eq!(api.count("delete_instance"), 1);
    let expected_id = format!("orders-db-{RUN_TS}-fromsnap-20240102000000");
    assert!(
        api.calls()
            .contains(&format!("delete_instance:{expected_id}"))
    );
}

#[tokio::test]
async fn test_teardown_runs_exactly_once_on_success() {
    let out = tempdir().unwrap();
    let api = orders_db_fake();
    let dumper = RecordingDumper::default();

    workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap();

    assert_eq!(api.count("delete_instance"), 1);
    assert_eq!(api.count("delete_snapshot"), 0);
}

#[tokio::test]
async fn test_fresh_snapshot_created_and_deleted_after_instance() {
    let out = tempdir().unwrap();
    let api = FakeRds::with_snapshots(&[]);
    let dumper = RecordingDumper::default();
    let mut run = backup_run(out.path());
    run.fresh_snapshot = true;

    let report = workflow::run(&api, &dumper, &run).await.unwrap();

    let snapshot_id = format!("orders-db-snap-{RUN_TS}");
    assert_eq!(
        report.restored_instance,
        format!("orders-db-{RUN_TS}-fromsnap-{RUN_TS}")
    );
    let calls = api.calls();
    assert!(
        calls
            .iter()
            .any(|c| c == &format!("create_snapshot:orders-db:{snapshot_id}:backups"))
    );
    let delete_instance_pos = calls
        .iter()
        .position(|c| c.starts_with("delete_instance"))
        .unwrap();
    let delete_snapshot_pos = calls
        .iter()
        .position(|c| c == &format!("delete_snapshot:{snapshot_id}"))
        .unwrap();
    assert!(delete_instance_pos < delete_snapshot_pos);
}

#[tokio::test]
async fn test_keep_snapshot_skips_snapshot_deletion() {
    let out = tempdir().unwrap();
    let api = FakeRds::with_snapshots(&[]);
    let dumper = RecordingDumper::default();
    let mut run = backup_run(out.path());
    run.fresh_snapshot = true;
    run.keep_fresh_snapshot = true;

    workflow::run(&api, &dumper, &run).await.unwrap();

    assert_eq!(api.count("delete_instance"), 1);
    assert_eq!(api.count("delete_snapshot"), 0);
}

#[tokio::test]
async fn test_security_group_replaces_group_list() {
    let out = tempdir().unwrap();
    let api = orders_db_fake();
    let dumper = RecordingDumper::default();

    workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap();

    let expected_id = format!("orders-db-{RUN_TS}-fromsnap-20240102000000");
    assert!(api.calls().contains(&format!(
        "set_security_groups:{expected_id}:sg-0123456789abcdef0"
    )));
}

#[tokio::test]
async fn test_teardown_failure_does_not_mask_dump_failure() {
    let out = tempdir().unwrap();
    let mut api = orders_db_fake();
    api.fail_delete_instance = true;
    let dumper = RecordingDumper::failing();

    let err = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap_err();

    // The dump failure is what the operator acts on; the deletion was still
    // attempted.
    assert!(matches!(err, BackupError::DumpFailed(_)));
    assert_eq!(api.count("delete_instance"), 1);
}

#[tokio::test]
async fn test_teardown_failure_after_successful_dump_is_reported() {
    let out = tempdir().unwrap();
    let mut api = orders_db_fake();
    api.fail_delete_instance = true;
    let dumper = RecordingDumper::default();

    let err = workflow::run(&api, &dumper, &backup_run(out.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::TeardownFailed(_)));
    assert_eq!(dumper.requests().len(), 1);
}

#[tokio::test]
async fn test_fresh_snapshot_status_probe_error_is_a_creation_failure() {
    let out = tempdir().unwrap();
    let mut api = FakeRds::with_snapshots(&[]);
    api.fail_snapshot_status = true;
    let run = backup_run(out.path());

    let err = snapshot::create_fresh(&api, &run, &WaitPolicy::SNAPSHOT)
        .await
        .unwrap_err();

    assert!(matches!(err, BackupError::SnapshotCreationFailed(_)));
}
