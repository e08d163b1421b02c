// snapdump/src/config/mod.rs
//! Run-scoped configuration built once from validated CLI input.
//!
//! Database credentials are never taken on the command line or from the
//! process environment; they live in per-profile files next to the tool:
//!
//! For Postgres instances, `.{profile}.pgpass` must have permissions of
//! 0600 and contain a line like
//!
//! ```text
//! *:5432:<dbname>:<dbuser>:<password>
//! ```
//!
//! For MySQL instances, `.{profile}.my.cnf` must have permissions of 0600
//! and read:
//!
//! ```text
//! [client]
//! password=<password>
//! ```
//!
//! `{profile}` defaults to the source instance identifier. The 0600 mode is
//! an operational precondition the native tools enforce, not this program.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};

use crate::cli::Cli;
use crate::rds::DbEngine;

/// Everything one invocation needs: validated inputs plus the run-start
/// timestamp all derived identifiers are based on. Never persisted.
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub source_instance: String,
    pub database: String,
    pub security_group: String,
    pub billing_tag: String,
    /// Create an on-demand snapshot instead of selecting the latest
    /// automated one.
    pub fresh_snapshot: bool,
    /// Leave the on-demand snapshot in place after teardown.
    pub keep_fresh_snapshot: bool,
    pub credential_profile: String,
    pub output_root: PathBuf,
    pub credentials_dir: PathBuf,
    pub started_at: NaiveDateTime,
}

impl BackupRun {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        validate_identifier("instance", &cli.instance)?;
        validate_identifier("database", &cli.database)?;
        if cli.security_group.trim().is_empty() {
            anyhow::bail!("security group identifier cannot be empty");
        }
        if cli.billing_tag.trim().is_empty() {
            anyhow::bail!("billing tag cannot be empty");
        }

        let credential_profile = match cli.profile {
            Some(profile) => {
                validate_identifier("profile", &profile)?;
                profile
            }
            None => cli.instance.clone(),
        };

        Ok(BackupRun {
            source_instance: cli.instance,
            database: cli.database,
            security_group: cli.security_group,
            billing_tag: cli.billing_tag,
            fresh_snapshot: cli.fresh_snapshot,
            keep_fresh_snapshot: cli.keep_snapshot,
            credential_profile,
            output_root: cli.output_dir,
            credentials_dir: cli.credentials_dir,
            started_at: Utc::now().naive_utc(),
        })
    }

    /// Path of the credential file the dump tool for `engine` reads.
    pub fn credential_file(&self, engine: DbEngine) -> PathBuf {
        credential_file(&self.credentials_dir, &self.credential_profile, engine)
    }
}

fn validate_identifier(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{what} name cannot be empty");
    }
    if value.contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
        anyhow::bail!("invalid character in {what} name: {value:?}");
    }
    Ok(())
}

/// `.{profile}.my.cnf` for MySQL-family engines, `.{profile}.pgpass` for
/// PostgreSQL-family ones.
pub fn credential_file(dir: &Path, profile: &str, engine: DbEngine) -> PathBuf {
    let name = match engine {
        DbEngine::Mysql => format!(".{profile}.my.cnf"),
        DbEngine::Postgres => format!(".{profile}.pgpass"),
    };
    dir.join(name)
}
