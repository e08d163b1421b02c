//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Back up a live RDS database without touching it: restore its latest
/// snapshot into a throwaway instance, dump that, delete the instance.
#[derive(Parser, Debug)]
#[command(
    name = "snapdump",
    version,
    about = "Downtime-free logical dumps of RDS instances via throwaway snapshot restores",
    long_about = "Selects (or creates) a point-in-time snapshot of the given RDS instance, \
                  restores it into a brand-new throwaway instance, dumps the named database \
                  with mysqldump or pg_dump, and deletes the throwaway instance afterwards. \
                  The production instance is never touched.\n\n\
                  Database credentials are read from .<profile>.my.cnf or .<profile>.pgpass \
                  in the credentials directory; both must be chmod 0600."
)]
pub struct Cli {
    /// Source RDS instance identifier
    pub instance: String,

    /// Logical database name to dump
    pub database: String,

    /// VPC security group id granting this host access to the restored instance
    pub security_group: String,

    /// Value of the billing tag attached to resources this run creates
    pub billing_tag: String,

    /// Create a fresh on-demand snapshot instead of using the latest
    /// automated one. May briefly stall writes on single-AZ sources; intended
    /// for multi-AZ instances only.
    #[arg(long)]
    pub fresh_snapshot: bool,

    /// Keep the on-demand snapshot after the run instead of deleting it
    #[arg(long, requires = "fresh_snapshot")]
    pub keep_snapshot: bool,

    /// Credential profile; defaults to the source instance identifier
    #[arg(long)]
    pub profile: Option<String>,

    /// Directory receiving the per-instance dump directories
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Directory holding the credential files
    #[arg(long, default_value = ".")]
    pub credentials_dir: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
