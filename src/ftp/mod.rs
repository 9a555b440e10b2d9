//! FTP transport over a single blocking control connection.

pub mod client;
pub mod data;
pub mod error;
pub mod parser;
pub mod protocol;

pub use client::FtpClient;
pub use error::{FtpError, FtpErrorKind, FtpResult};
