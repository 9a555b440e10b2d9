//! ftpsync - upload a local directory tree to an FTP server
//!
//! Only changed files are sent (size + modification time). With --mir,
//! remote entries that no longer exist locally are deleted.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use ftpsync::cli::Args;
use ftpsync::config::{self, ConfigFile};
use ftpsync::credentials::{self, TerminalPrompter};
use ftpsync::ftp::FtpClient;
use ftpsync::logger::{Logger, NoopLogger, TextLogger};
use ftpsync::progress::SyncProgress;
use ftpsync::sync::RunPhase;
use ftpsync::SyncError;

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();

    let file = match &args.target {
        Some(_) => Some(
            ConfigFile::load(&args.config)
                .with_context(|| format!("Failed to load {}", args.config.display()))?,
        ),
        None => None,
    };
    let target = match (&file, &args.target) {
        (Some(f), Some(name)) => Some(f.target(name)?),
        _ => None,
    };
    let cfg = config::resolve(&args, target).context("Invalid configuration")?;

    // Choose logger once; NoopLogger when no log file was asked for
    let logger: Arc<dyn Logger> = match &args.log_file {
        Some(p) => match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                eprintln!("Warning: cannot open log file {}: {}", p.display(), e);
                Arc::new(NoopLogger)
            }
        },
        None => Arc::new(NoopLogger),
    };

    let creds = credentials::resolve(&cfg.host, &cfg.auth, &mut TerminalPrompter, &mut |w: &str| {
        eprintln!("Warning: {}", w);
    })
    .map_err(SyncError::from)
    .context("Could not resolve FTP credentials")?;

    let progress = SyncProgress::new(cfg.verbose);
    let mut client = FtpClient::new(cfg.timeout);
    let report = ftpsync::run(&cfg, &creds, &mut client, logger.as_ref(), &progress);

    if report.disconnected {
        progress.finish_summary(&report.counters, report.error.is_some());
    } else {
        progress.finish_error(if report.phase == RunPhase::Init {
            "nothing was sent to the server"
        } else {
            "connection was not closed cleanly"
        });
    }
    if !report.warnings.is_empty() {
        eprintln!("{} warning(s) during sync", report.warnings.len());
    }

    if let Some(err) = report.error {
        eprintln!("Error: {:#}", anyhow::Error::new(err));
        std::process::exit(1);
    }
    Ok(())
}
