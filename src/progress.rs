//! Cargo-style console output
//!
//! - File operations scroll above
//! - Spinner with the current remote directory stays at the bottom
//! - Per-file lines only in verbose mode; warnings, errors and the
//!   summary always

use crate::sync::SyncCounters;
use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// A per-file event shown in verbose mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Uploaded,
    Unchanged,
    Deleted,
    RemovedDir,
    Kept,
}

impl FileOp {
    fn label(self) -> &'static str {
        match self {
            FileOp::Uploaded => "Uploaded",
            FileOp::Unchanged => "Unchanged",
            FileOp::Deleted => "Deleted",
            FileOp::RemovedDir => "Removed",
            FileOp::Kept => "Kept",
        }
    }

    fn color(self) -> Color {
        match self {
            FileOp::Uploaded => Color::Green,
            FileOp::Unchanged => Color::DarkGrey,
            FileOp::Kept => Color::Yellow,
            FileOp::Deleted | FileOp::RemovedDir => Color::Red,
        }
    }
}

pub struct SyncProgress {
    spinner: ProgressBar,
    start_time: Instant,
    show_files: bool,
    silent: bool,
}

impl SyncProgress {
    pub fn new(verbose: bool) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner,
            start_time: Instant::now(),
            show_files: verbose,
            silent: false,
        }
    }

    /// No terminal output at all (tests, embedding).
    pub fn hidden() -> Self {
        Self {
            spinner: ProgressBar::hidden(),
            start_time: Instant::now(),
            show_files: false,
            silent: true,
        }
    }

    /// Update the bottom status line with the directory being reconciled.
    pub fn set_directory(&self, remote: &str, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "{} ({}/{}) {} in {:.1}s",
            "Syncing".with(Color::Green).bold(),
            current,
            total,
            remote,
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    /// Print a file operation above the spinner (verbose only).
    pub fn file_op(&self, op: FileOp, path: &str) {
        if self.show_files {
            self.spinner.suspend(|| {
                println!(
                    "  {} {}",
                    format!("{:>9}", op.label()).with(op.color()).bold(),
                    path.with(Color::Cyan)
                );
            });
        }
    }

    /// Always-on informational line.
    pub fn ok(&self, msg: &str) {
        if self.silent {
            return;
        }
        self.spinner
            .suspend(|| println!("{} {}", ">>".with(Color::Green), msg));
    }

    pub fn warn(&self, msg: &str) {
        if self.silent {
            return;
        }
        self.spinner.suspend(|| {
            eprintln!("{} {}", "Warning:".with(Color::Yellow).bold(), msg);
        });
    }

    pub fn error(&self, msg: &str) {
        if self.silent {
            return;
        }
        self.spinner.suspend(|| {
            eprintln!("{} {}", "Error:".with(Color::Red).bold(), msg);
        });
    }

    /// Summary after the connection was closed cleanly.
    pub fn finish_summary(&self, counters: &SyncCounters, aborted: bool) {
        self.spinner.finish_and_clear();
        if self.silent {
            return;
        }
        let headline = if aborted {
            "FTP sync aborted".with(Color::Red).bold()
        } else {
            "FTP upload done!".with(Color::Green).bold()
        };
        println!("{} in {:.1}s", headline, self.start_time.elapsed().as_secs_f64());
        println!("{}", counters.summary_line());
    }

    /// The connection was lost; no counters are guaranteed.
    pub fn finish_error(&self, msg: &str) {
        self.spinner.finish_and_clear();
        if self.silent {
            return;
        }
        eprintln!("{} {}", "FTP sync failed:".with(Color::Red).bold(), msg);
    }
}
