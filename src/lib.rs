//! ftpsync library
//!
//! Directory-to-FTP synchronization: local tree scan, per-directory remote
//! reconciliation and optional mirror deletions over one control connection.

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fs_enum;
pub mod ftp;
pub mod gateway;
pub mod logger;
pub mod progress;
pub mod remote_path;
pub mod sync;
pub mod transport;
pub mod url;

pub use config::SyncConfig;
pub use credentials::Credentials;
pub use error::{SyncError, SyncWarning};
pub use sync::{run, SyncCounters, SyncReport};
pub use transport::{RemoteEntry, RemoteEntryKind, Transport};
