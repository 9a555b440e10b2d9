//! Run-level error taxonomy
//!
//! Fatal conditions unwind to the orchestrator as [`SyncError`]; recoverable
//! ones are recorded as [`SyncWarning`] and the run carries on.

use crate::credentials::CredentialError;
use crate::ftp::FtpError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse class of a fatal error, used for exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad local root or configuration; nothing was sent to the server.
    Config,
    /// Connection or login rejected.
    Auth,
    /// Remote directory creation or deletion failed mid-run.
    RemoteStructural,
    /// The control connection dropped; the server state is unknown.
    ConnectionLost,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} is not an existing directory")]
    InvalidRoot(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: FtpError,
    },

    #[error("authentication failed: {0}")]
    Auth(#[source] FtpError),

    #[error("error creating remote folder {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: FtpError,
    },

    #[error("error deleting file {path}: {source}")]
    DeleteFile {
        path: String,
        #[source]
        source: FtpError,
    },

    #[error("error deleting directory {path}: {source}")]
    RemoveDir {
        path: String,
        #[source]
        source: FtpError,
    },

    #[error("directory {path} still not empty after {passes} passes; giving up")]
    RemoveDirRunaway { path: String, passes: usize },

    #[error("directory {path} is nested deeper than {limit} levels; refusing to descend")]
    RemoveDirTooDeep { path: String, limit: usize },

    #[error("connection to the server was lost: {0}")]
    ConnectionLost(#[source] FtpError),
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::InvalidRoot(_) | SyncError::Config(_) | SyncError::Credentials(_) => {
                ErrorClass::Config
            }
            SyncError::Connect { .. } | SyncError::Auth(_) => ErrorClass::Auth,
            SyncError::CreateDir { .. }
            | SyncError::DeleteFile { .. }
            | SyncError::RemoveDir { .. }
            | SyncError::RemoveDirRunaway { .. }
            | SyncError::RemoveDirTooDeep { .. } => ErrorClass::RemoteStructural,
            SyncError::ConnectionLost(_) => ErrorClass::ConnectionLost,
        }
    }
}

/// A failure that was absorbed where it happened.
#[derive(Debug, Clone)]
pub enum SyncWarning {
    /// A single upload failed; the file was skipped.
    Transfer { file: PathBuf, error: FtpError },
    /// A directory listing failed; the run assumed it was empty.
    Listing { path: String, error: FtpError },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::Transfer { file, error } => {
                write!(f, "Cannot upload file: {} --> {}", file.display(), error)
            }
            SyncWarning::Listing { path, error } => {
                write!(f, "Could not list remote folder {} --> {}", path, error)
            }
        }
    }
}
