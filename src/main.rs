// snapdump/src/main.rs
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use snapdump::cli::Cli;
use snapdump::config::BackupRun;
use snapdump::dump::ShellDumper;
use snapdump::rds::aws::AwsRds;
use snapdump::workflow::{self, RunReport};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_app(cli).await {
        Ok(report) => {
            println!(
                "✅ Backup completed successfully: {}",
                report.artifact.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_app(cli: Cli) -> Result<RunReport> {
    let run = BackupRun::from_cli(cli).context("invalid arguments")?;
    let api = AwsRds::connect().await;
    let report = workflow::run(&api, &ShellDumper, &run)
        .await
        .with_context(|| format!("backup of {} failed", run.source_instance))?;
    Ok(report)
}
