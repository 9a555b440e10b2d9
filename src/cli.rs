//! Command-line arguments

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Default target file read when `--target` is given.
pub const DEFAULT_CONFIG_FILE: &str = "ftpsync.toml";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "ftpsync - upload a local directory to an FTP server, optionally mirroring deletions"
)]
pub struct Args {
    /// Local source directory (not required with --target)
    #[arg(required_unless_present = "target")]
    pub source: Option<PathBuf>,

    /// Remote destination: ftp://[user@]host[:port]/path (not required with --target)
    #[arg(required_unless_present = "target")]
    pub destination: Option<String>,

    /// Named target from the config file
    #[arg(long)]
    pub target: Option<String>,

    /// Config file holding [targets.<name>] tables
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Separator used for remote paths
    #[arg(long = "dest-sep")]
    pub dest_sep: Option<String>,

    /// Minutes added to remote timestamps before comparing with local ones
    #[arg(long = "time-adjust", allow_negative_numbers = true)]
    pub time_adjust: Option<i64>,

    /// Exclude local entries matching patterns
    #[arg(long = "xf", action = ArgAction::Append)]
    pub exclusions: Vec<String>,

    /// Never delete remote entries matching patterns
    #[arg(long = "keep", action = ArgAction::Append)]
    pub keep: Vec<String>,

    /// Upload every file, skipping the size/time check
    #[arg(long)]
    pub force_upload: bool,

    /// Show individual file operations as they happen
    #[arg(short, long)]
    pub verbose: bool,

    /// Mirror mode - also delete remote entries missing locally
    #[arg(long = "mir", alias = "mirror", alias = "sync")]
    pub mirror: bool,

    /// FTP username
    #[arg(long)]
    pub user: Option<String>,

    /// JSON credentials file
    #[arg(long = "auth-file")]
    pub auth_file: Option<PathBuf>,

    /// Key to look up in the credentials file (defaults to the host)
    #[arg(long = "auth-key")]
    pub auth_key: Option<String>,

    /// Append log lines to file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Connect and read timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}
