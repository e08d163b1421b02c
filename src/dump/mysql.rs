// snapdump/src/dump/mysql.rs
//! MySQL-family dump: `mysqldump --single-transaction` piped through `xz`.
//!
//! The two stages are separate OS processes joined by a pipe and awaited
//! independently. xz exiting zero says nothing about mysqldump, which may
//! have died mid-stream after xz happily compressed the truncated output,
//! so both exit statuses are checked.

use std::ffi::OsString;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};
use which::which;

use super::{DumpRequest, create_artifact};
use crate::errors::{BackupError, Result};

fn mysqldump_args(request: &DumpRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let mut defaults_flag = OsString::from("--defaults-extra-file=");
    defaults_flag.push(request.credential_file.as_os_str());
    args.push(defaults_flag);
    args.push("--single-transaction".into());
    args.push("--databases".into());
    args.push(request.database.clone().into());
    args.push("-h".into());
    args.push(request.host.clone().into());
    args.push("-u".into());
    args.push(request.user.clone().into());
    args.push("-P".into());
    args.push(request.port.to_string().into());
    args
}

pub(super) async fn dump(request: &DumpRequest) -> Result<()> {
    let mysqldump_path = which("mysqldump").map_err(|_| {
        BackupError::DumpFailed("mysqldump not found in PATH".to_string())
    })?;
    let xz_path = which("xz")
        .map_err(|_| BackupError::DumpFailed("xz not found in PATH".to_string()))?;

    info!(
        "dumping database {} from {}:{} with mysqldump, using {}",
        request.database,
        request.host,
        request.port,
        request.credential_file.display()
    );

    run_pipeline(&mysqldump_path, &xz_path, request).await
}

async fn run_pipeline(
    mysqldump_path: &std::path::Path,
    xz_path: &std::path::Path,
    request: &DumpRequest,
) -> Result<()> {
    let artifact = create_artifact(&request.artifact_path)?;

    let mut dump_child = Command::new(mysqldump_path)
        .args(mysqldump_args(request))
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BackupError::DumpFailed(format!("failed to spawn mysqldump: {e}")))?;

    let dump_stdout = dump_child
        .stdout
        .take()
        .ok_or_else(|| BackupError::DumpFailed("mysqldump stdout not captured".to_string()))?;
    let dump_stdout: Stdio = dump_stdout
        .try_into()
        .map_err(|e| BackupError::DumpFailed(format!("failed to wire mysqldump pipe: {e}")))?;

    let compress_spawn = Command::new(xz_path)
        .arg("--stdout")
        .arg("-")
        .stdin(dump_stdout)
        .stdout(Stdio::from(artifact))
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn();
    let mut compress_child = match compress_spawn {
        Ok(child) => child,
        Err(e) => {
            // Without a compressor there is nothing to drain the pipe;
            // reap mysqldump instead of leaving it running against the
            // instance.
            let _ = dump_child.start_kill();
            let _ = dump_child.wait().await;
            return Err(BackupError::DumpFailed(format!("failed to spawn xz: {e}")));
        }
    };

    let dump_status = dump_child
        .wait()
        .await
        .map_err(|e| BackupError::DumpFailed(format!("failed to wait for mysqldump: {e}")))?;
    let compress_status = compress_child
        .wait()
        .await
        .map_err(|e| BackupError::DumpFailed(format!("failed to wait for xz: {e}")))?;

    debug!(
        "mysqldump exited with {}, xz exited with {}",
        dump_status, compress_status
    );

    if !dump_status.success() {
        return Err(BackupError::DumpFailed(format!(
            "mysqldump exited with {dump_status}"
        )));
    }
    if !compress_status.success() {
        return Err(BackupError::DumpFailed(format!(
            "xz exited with {compress_status}"
        )));
    }
    Ok(())
}
