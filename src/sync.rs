//! Sync orchestration
//!
//! A run moves through `Init -> Authenticating -> ProcessingDirectories ->
//! Finalizing -> Done`. The local tree is scanned before anything is sent
//! to the server; directories are then reconciled one at a time in scan
//! order over the single transport. A fatal error stops the queue, and the
//! transport is always asked to quit before the report is returned.

use crate::config::SyncConfig;
use crate::credentials::Credentials;
use crate::error::{SyncError, SyncWarning};
use crate::fs_enum::{scan_local_tree, LocalTreeIndex, PatternSet, RelDir};
use crate::ftp::FtpError;
use crate::gateway::RemoteGateway;
use crate::logger::Logger;
use crate::progress::{FileOp, SyncProgress};
use crate::remote_path::PathTranslator;
use crate::transport::{RemoteEntry, Transport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Conversion for the remote timestamp adjustment, which is given in minutes.
pub const SECONDS_PER_MINUTE: i64 = 60;

/// Largest remote clock shift accepted in either direction (one leap year).
pub const MAX_TIME_ADJUST_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncCounters {
    pub checked: u64,
    pub uploaded: u64,
    pub deleted: u64,
}

impl SyncCounters {
    pub fn summary_line(&self) -> String {
        format!(
            "Files checked: {}, uploaded {}, deleted {}",
            self.checked, self.uploaded, self.deleted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Authenticating,
    ProcessingDirectories,
    Finalizing,
    Done,
}

/// Size and modification time (Unix seconds) of a local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStat {
    pub size: u64,
    pub mtime: i64,
}

impl LocalStat {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        let modified: DateTime<Utc> = meta.modified()?.into();
        Ok(Self {
            size: meta.len(),
            mtime: modified.timestamp(),
        })
    }
}

/// Decide whether a local file has to be sent.
///
/// A file is skipped only when the remote copy has the same size and its
/// timestamp, shifted by `adjust_minutes`, is not newer than the local one.
/// Missing remote entries and entries without a timestamp are uploaded.
pub fn needs_upload(
    local: &LocalStat,
    remote: Option<&RemoteEntry>,
    adjust_minutes: i64,
    force: bool,
) -> bool {
    if force {
        return true;
    }
    let remote = match remote {
        Some(r) if !r.is_dir() => r,
        _ => return true,
    };
    let modified = match remote.modified {
        Some(m) => m,
        None => return true,
    };
    if remote.size != local.size {
        return true;
    }
    let adjusted = modified
        .timestamp()
        .saturating_add(adjust_minutes.saturating_mul(SECONDS_PER_MINUTE));
    adjusted > local.mtime
}

/// Outcome of one run.
#[derive(Debug)]
pub struct SyncReport {
    pub counters: SyncCounters,
    pub warnings: Vec<SyncWarning>,
    pub error: Option<SyncError>,
    /// Phase the run failed in, or `Done`.
    pub phase: RunPhase,
    /// The transport acknowledged the quit. The summary is only
    /// trustworthy when this is set.
    pub disconnected: bool,
    pub elapsed_secs: f64,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// State of a single run. Created by [`run`] and dropped when it returns.
struct RunContext<'a> {
    config: &'a SyncConfig,
    logger: &'a dyn Logger,
    progress: &'a SyncProgress,
    paths: PathTranslator,
    keep: PatternSet,
    remote_root: String,
    counters: SyncCounters,
    warnings: Vec<SyncWarning>,
    phase: RunPhase,
}

/// Upload `config.src` to `config.dest` over `transport`.
pub fn run(
    config: &SyncConfig,
    credentials: &Credentials,
    transport: &mut dyn Transport,
    logger: &dyn Logger,
    progress: &SyncProgress,
) -> SyncReport {
    let started = Instant::now();
    logger.start(&config.src, &config.dest);

    let paths = PathTranslator::new(config.dest_sep);
    let mut ctx = RunContext {
        config,
        logger,
        progress,
        paths,
        keep: PatternSet::default(),
        remote_root: paths.normalize(&config.dest),
        counters: SyncCounters::default(),
        warnings: Vec::new(),
        phase: RunPhase::Init,
    };

    let index = match ctx.prepare() {
        Ok(index) => index,
        Err(e) => return ctx.finish(Some(e), false, started),
    };

    ctx.phase = RunPhase::Authenticating;
    if let Err(e) = transport.connect(&config.host, config.port) {
        let err = SyncError::Connect {
            host: config.host.clone(),
            port: config.port,
            source: e,
        };
        return ctx.finish(Some(err), false, started);
    }
    logger.connected(&config.host, config.port);

    let mut error = match transport.authenticate(&credentials.username, &credentials.password) {
        Ok(()) => None,
        Err(e) => Some(SyncError::Auth(e)),
    };

    if error.is_none() {
        ctx.anchor_remote_root(transport);
        ctx.phase = RunPhase::ProcessingDirectories;
        error = ctx.process(transport, &index).err();
    }

    if error.is_none() {
        ctx.phase = RunPhase::Finalizing;
    }
    let disconnected = match transport.quit() {
        Ok(()) => true,
        Err(e) => {
            logger.error("quit", &config.host, &e.to_string());
            false
        }
    };
    ctx.finish(error, disconnected, started)
}

impl<'a> RunContext<'a> {
    fn prepare(&mut self) -> Result<LocalTreeIndex, SyncError> {
        let exclusions = PatternSet::new(&self.config.exclusions)
            .map_err(|e| SyncError::Config(format!("bad exclusion pattern: {}", e)))?;
        self.keep = PatternSet::new(&self.config.keep)
            .map_err(|e| SyncError::Config(format!("bad keep pattern: {}", e)))?;
        scan_local_tree(&self.config.src, &exclusions)
    }

    /// A relative remote root is resolved against the login directory so
    /// later absolute paths stay valid after tree removal moves the cwd.
    fn anchor_remote_root(&mut self, transport: &mut dyn Transport) {
        if self.remote_root.starts_with(self.paths.dest_sep()) {
            return;
        }
        if let Ok(Some(home)) = transport.working_directory() {
            let root = if self.remote_root == "." {
                home
            } else {
                self.paths.join(&[home.as_str(), self.remote_root.as_str()])
            };
            self.remote_root = self.paths.normalize(&root);
        }
    }

    fn process(&mut self, transport: &mut dyn Transport, index: &LocalTreeIndex) -> Result<(), SyncError> {
        let mut gateway = RemoteGateway::new(transport, self.paths, self.logger, self.progress);
        let total = index.len();
        for (i, (dir, files)) in index.iter().enumerate() {
            self.sync_directory(&mut gateway, dir, files, i + 1, total)?;
        }
        Ok(())
    }

    fn sync_directory(
        &mut self,
        gateway: &mut RemoteGateway<'_>,
        dir: &RelDir,
        files: &[String],
        position: usize,
        total: usize,
    ) -> Result<(), SyncError> {
        let remote = self
            .paths
            .normalize(&self.paths.join(&[self.remote_root.as_str(), dir.as_str()]));
        self.progress.set_directory(&remote, position, total);

        gateway.ensure_dir(&remote)?;
        let listing = match gateway.list(&remote) {
            Ok(entries) => entries,
            Err(e) => {
                self.absorb(e, |error| SyncWarning::Listing {
                    path: remote.clone(),
                    error,
                })?;
                Vec::new()
            }
        };
        let by_name: HashMap<&str, &RemoteEntry> =
            listing.iter().map(|e| (e.name.as_str(), e)).collect();

        let local_dir = dir.local_path(&self.config.src);
        for name in files {
            self.counters.checked += 1;
            let local_file = local_dir.join(name);
            let stat = match LocalStat::of(&local_file) {
                Ok(stat) => stat,
                Err(e) => {
                    self.absorb(FtpError::from(e), |error| SyncWarning::Transfer {
                        file: local_file.clone(),
                        error,
                    })?;
                    continue;
                }
            };

            let remote_entry = by_name.get(name.as_str()).copied();
            if !needs_upload(
                &stat,
                remote_entry,
                self.config.time_adjust_minutes,
                self.config.force_upload,
            ) {
                self.logger.unchanged(&local_file);
                self.progress
                    .file_op(FileOp::Unchanged, &self.paths.join(&[remote.as_str(), name.as_str()]));
                continue;
            }

            match gateway.upload(&local_file, name) {
                Ok(_) => self.counters.uploaded += 1,
                Err(e) => self.absorb(e, |error| SyncWarning::Transfer {
                    file: local_file.clone(),
                    error,
                })?,
            }
        }

        if self.config.mirror {
            self.delete_orphans(gateway, &remote, &local_dir, &listing)?;
        }
        Ok(())
    }

    fn delete_orphans(
        &mut self,
        gateway: &mut RemoteGateway<'_>,
        remote: &str,
        local_dir: &Path,
        listing: &[RemoteEntry],
    ) -> Result<(), SyncError> {
        for entry in listing {
            if local_dir.join(&entry.name).exists() {
                continue;
            }
            let full = self.paths.normalize(&self.paths.join(&[remote, entry.name.as_str()]));
            if self.keep.matches(&full) {
                continue;
            }
            if entry.is_dir() {
                gateway.remove_dir_tree(&full, &self.keep, &mut self.counters)?;
            } else {
                gateway.delete_file(&full, &mut self.counters)?;
            }
        }
        Ok(())
    }

    /// Record a recoverable failure, unless the connection itself is gone.
    fn absorb(
        &mut self,
        error: FtpError,
        warning: impl FnOnce(FtpError) -> SyncWarning,
    ) -> Result<(), SyncError> {
        if error.is_connection_lost() {
            return Err(SyncError::ConnectionLost(error));
        }
        let warning = warning(error);
        let msg = warning.to_string();
        let context = match warning {
            SyncWarning::Transfer { .. } => "upload",
            SyncWarning::Listing { .. } => "list",
        };
        self.logger.warning(context, &msg);
        match warning {
            SyncWarning::Transfer { .. } => self.progress.error(&msg),
            SyncWarning::Listing { .. } => self.progress.warn(&msg),
        }
        self.warnings.push(warning);
        Ok(())
    }

    fn finish(self, error: Option<SyncError>, disconnected: bool, started: Instant) -> SyncReport {
        let elapsed_secs = started.elapsed().as_secs_f64();
        let c = self.counters;
        if let Some(e) = &error {
            self.logger.error("run", &self.remote_root, &e.to_string());
        }
        self.logger.done(c.checked, c.uploaded, c.deleted, elapsed_secs);
        SyncReport {
            counters: c,
            warnings: self.warnings,
            phase: if error.is_none() {
                RunPhase::Done
            } else {
                self.phase
            },
            error,
            disconnected,
            elapsed_secs,
        }
    }
}
