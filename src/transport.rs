//! The remote side as the sync engine sees it.
//!
//! Every call goes over one control connection and must finish before the
//! next one is issued; implementations are never shared between threads.

use crate::ftp::FtpResult;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Coarse type of a listed remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEntryKind {
    File,
    Directory,
    /// Symlinks and anything the listing could not classify.
    Other,
}

/// One row of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: RemoteEntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            kind: RemoteEntryKind::File,
            size,
            modified,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RemoteEntryKind::Directory,
            size: 0,
            modified: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == RemoteEntryKind::Directory
    }
}

/// Remote file-transfer operations the sync engine needs.
pub trait Transport {
    fn connect(&mut self, host: &str, port: u16) -> FtpResult<()>;
    fn authenticate(&mut self, username: &str, password: &str) -> FtpResult<()>;
    fn change_directory(&mut self, path: &str) -> FtpResult<()>;
    fn make_directory(&mut self, path: &str) -> FtpResult<()>;
    fn list_directory(&mut self, path: &str) -> FtpResult<Vec<RemoteEntry>>;
    /// Store `local` as `remote_name` in the current remote directory.
    /// Returns the number of bytes sent.
    fn put_file(&mut self, local: &Path, remote_name: &str) -> FtpResult<u64>;
    fn delete_file(&mut self, path: &str) -> FtpResult<()>;
    /// Remove an empty directory.
    fn remove_directory(&mut self, path: &str) -> FtpResult<()>;
    fn quit(&mut self) -> FtpResult<()>;

    /// Absolute login directory, when the transport can tell. Used to
    /// anchor a relative remote root before any directory is changed.
    fn working_directory(&mut self) -> FtpResult<Option<String>> {
        Ok(None)
    }
}
