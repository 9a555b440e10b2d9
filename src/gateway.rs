//! Remote directory operations built on a [`Transport`].
//!
//! The gateway decides which failures are fatal. Creating and deleting
//! are structural and come back as [`SyncError`]; listing and uploading
//! return the raw [`FtpError`](crate::ftp::FtpError) so the caller can downgrade them to
//! warnings.

use crate::error::SyncError;
use crate::fs_enum::PatternSet;
use crate::ftp::FtpResult;
use crate::logger::Logger;
use crate::progress::{FileOp, SyncProgress};
use crate::remote_path::PathTranslator;
use crate::sync::SyncCounters;
use crate::transport::{RemoteEntry, Transport};
use std::collections::HashSet;
use std::path::Path;

/// Passes over a single directory before tree removal gives up on it.
pub const MAX_REMOVE_PASSES: usize = 8;

/// Nesting below the directory being removed that tree removal will follow.
pub const MAX_REMOVE_DEPTH: usize = 64;

struct PendingDir {
    path: String,
    depth: usize,
    passes: usize,
}

pub struct RemoteGateway<'a> {
    transport: &'a mut dyn Transport,
    paths: PathTranslator,
    logger: &'a dyn Logger,
    progress: &'a SyncProgress,
    cwd: Option<String>,
}

impl<'a> RemoteGateway<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        paths: PathTranslator,
        logger: &'a dyn Logger,
        progress: &'a SyncProgress,
    ) -> Self {
        Self {
            transport,
            paths,
            logger,
            progress,
            cwd: None,
        }
    }

    /// Change into `remote`, creating it first when the change fails.
    pub fn ensure_dir(&mut self, remote: &str) -> Result<(), SyncError> {
        if self.transport.change_directory(remote).is_ok() {
            self.cwd = Some(remote.to_string());
            return Ok(());
        }

        if let Err(e) = self.transport.make_directory(remote) {
            self.logger.error("mkdir", remote, &e.to_string());
            return Err(SyncError::CreateDir {
                path: remote.to_string(),
                source: e,
            });
        }
        self.logger.mkdir(remote);
        self.progress
            .ok(&format!("New remote folder created {}", remote));

        match self.transport.change_directory(remote) {
            Ok(()) => {
                self.cwd = Some(remote.to_string());
                Ok(())
            }
            Err(e) => {
                self.logger.error("cwd", remote, &e.to_string());
                Err(SyncError::CreateDir {
                    path: remote.to_string(),
                    source: e,
                })
            }
        }
    }

    pub fn list(&mut self, remote: &str) -> FtpResult<Vec<RemoteEntry>> {
        self.transport.list_directory(remote)
    }

    /// Store `local` as `remote_name` in the current remote directory.
    pub fn upload(&mut self, local: &Path, remote_name: &str) -> FtpResult<u64> {
        let bytes = self.transport.put_file(local, remote_name)?;
        let remote = match &self.cwd {
            Some(dir) => self.paths.join(&[dir.as_str(), remote_name]),
            None => remote_name.to_string(),
        };
        self.logger.upload_done(local, &remote, bytes);
        self.progress.file_op(FileOp::Uploaded, &remote);
        Ok(bytes)
    }

    pub fn delete_file(&mut self, remote: &str, counters: &mut SyncCounters) -> Result<(), SyncError> {
        if let Err(e) = self.transport.delete_file(remote) {
            self.logger.error("delete", remote, &e.to_string());
            return Err(SyncError::DeleteFile {
                path: remote.to_string(),
                source: e,
            });
        }
        counters.deleted += 1;
        self.logger.delete(remote);
        self.progress.file_op(FileOp::Deleted, remote);
        Ok(())
    }

    /// Empty and remove `root` and everything below it.
    ///
    /// Walks with an explicit stack: a directory is revisited after its
    /// children are gone and removed once its listing comes back empty.
    /// Entries matching `keep` are left alone, and so is every directory
    /// above them. Every file and directory removed bumps `counters.deleted`,
    /// so a failure part way through still leaves accurate partial counts.
    pub fn remove_dir_tree(
        &mut self,
        root: &str,
        keep: &PatternSet,
        counters: &mut SyncCounters,
    ) -> Result<(), SyncError> {
        let mut stack = vec![PendingDir {
            path: root.to_string(),
            depth: 0,
            passes: 0,
        }];
        // Directories that still hold kept entries after being emptied.
        let mut retained: HashSet<String> = HashSet::new();

        while let Some(top) = stack.last_mut() {
            if top.passes >= MAX_REMOVE_PASSES {
                return Err(SyncError::RemoveDirRunaway {
                    path: top.path.clone(),
                    passes: top.passes,
                });
            }
            top.passes += 1;
            let path = top.path.clone();
            let depth = top.depth;

            if let Err(e) = self.transport.change_directory(&path) {
                self.logger.error("cwd", &path, &e.to_string());
                return Err(SyncError::RemoveDir { path, source: e });
            }
            self.cwd = Some(path.clone());

            let entries = match self.transport.list_directory(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    self.logger.error("list", &path, &e.to_string());
                    return Err(SyncError::RemoveDir { path, source: e });
                }
            };

            let mut holds_kept = false;
            let mut removed_files = false;
            let mut subdirs = Vec::new();
            for entry in &entries {
                let child = self.paths.join(&[path.as_str(), entry.name.as_str()]);
                if keep.matches(&child) || retained.contains(&child) {
                    holds_kept = true;
                } else if entry.is_dir() {
                    subdirs.push(child);
                } else {
                    self.delete_file(&child, counters)?;
                    removed_files = true;
                }
            }

            if subdirs.is_empty() {
                if holds_kept {
                    // Nothing left but protected entries; the parent sees
                    // this directory as kept too.
                    self.progress.file_op(FileOp::Kept, &path);
                    retained.insert(path);
                    stack.pop();
                    continue;
                }
                if removed_files {
                    // Listed again on the next pass before removal.
                    continue;
                }
                if let Err(e) = self.transport.remove_directory(&path) {
                    self.logger.error("rmdir", &path, &e.to_string());
                    return Err(SyncError::RemoveDir { path, source: e });
                }
                counters.deleted += 1;
                self.logger.rmdir(&path);
                self.progress.file_op(FileOp::RemovedDir, &path);
                stack.pop();
                continue;
            }

            if depth + 1 > MAX_REMOVE_DEPTH {
                return Err(SyncError::RemoveDirTooDeep {
                    path,
                    limit: MAX_REMOVE_DEPTH,
                });
            }
            // Reversed so the first listed subdirectory is handled first.
            for child in subdirs.into_iter().rev() {
                stack.push(PendingDir {
                    path: child,
                    depth: depth + 1,
                    passes: 0,
                });
            }
        }
        Ok(())
    }
}
