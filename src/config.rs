//! Run configuration
//!
//! Values come from an optional TOML file of named targets and from the
//! command line; flags win. [`resolve`] produces the immutable
//! [`SyncConfig`] a run borrows.

use crate::cli::Args;
use crate::error::SyncError;
use crate::sync::MAX_TIME_ADJUST_MINUTES;
use crate::url::{parse_remote_url, DEFAULT_FTP_PORT};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DEST_SEP: char = '/';
pub const DEFAULT_AUTH_FILE: &str = ".ftppass";

/// A string, or a list of which only the first element counts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn first(&self) -> Option<&str> {
        match self {
            OneOrMany::One(s) => Some(s),
            OneOrMany::Many(v) => v.first().map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub auth_key: Option<String>,
    pub auth_path: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub src: Option<OneOrMany>,
    pub dest: Option<OneOrMany>,
    pub dest_sep: Option<String>,
    pub dest_time_adjustment_minutes: Option<i64>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub keep: Vec<String>,
    #[serde(default)]
    pub force_upload: bool,
    #[serde(default)]
    pub force_verbose: bool,
    #[serde(default)]
    pub sync_mode: bool,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        toml::from_str(text).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let text = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn target(&self, name: &str) -> Result<&TargetConfig, SyncError> {
        self.targets
            .get(name)
            .ok_or_else(|| SyncError::Config(format!("no target named '{}'", name)))
    }
}

/// Where credentials may come from before falling back to a prompt.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_key: Option<String>,
    pub auth_path: PathBuf,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_key", &self.auth_key)
            .field("auth_path", &self.auth_path)
            .finish()
    }
}

/// Everything one run needs. Built once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub host: String,
    pub port: u16,
    pub src: PathBuf,
    pub dest: String,
    pub dest_sep: char,
    pub time_adjust_minutes: i64,
    pub exclusions: Vec<String>,
    pub keep: Vec<String>,
    pub force_upload: bool,
    pub verbose: bool,
    pub mirror: bool,
    pub timeout: Duration,
    pub auth: AuthSettings,
}

impl SyncConfig {
    /// Config with defaults for everything but the endpoints.
    pub fn new(host: impl Into<String>, src: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_FTP_PORT,
            src: src.into(),
            dest: dest.into(),
            dest_sep: DEFAULT_DEST_SEP,
            time_adjust_minutes: 0,
            exclusions: Vec::new(),
            keep: Vec::new(),
            force_upload: false,
            verbose: false,
            mirror: false,
            timeout: Duration::from_secs(30),
            auth: AuthSettings {
                auth_path: PathBuf::from(DEFAULT_AUTH_FILE),
                ..AuthSettings::default()
            },
        }
    }
}

/// Parse a separator option; exactly one character is accepted.
pub fn parse_dest_sep(s: &str) -> Result<char, SyncError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(SyncError::Config(format!(
            "destSep must be a single character, got '{}'",
            s
        ))),
    }
}

/// Merge a file target (if any) with command-line flags.
pub fn resolve(args: &Args, target: Option<&TargetConfig>) -> Result<SyncConfig, SyncError> {
    let empty = TargetConfig::default();
    let target = target.unwrap_or(&empty);

    let src = match (&args.source, target.src.as_ref().and_then(OneOrMany::first)) {
        (Some(p), _) => p.clone(),
        (None, Some(s)) => PathBuf::from(s),
        (None, None) => return Err(SyncError::Config("no local source directory given".into())),
    };

    let url = match &args.destination {
        Some(d) => Some(parse_remote_url(d).ok_or_else(|| {
            SyncError::Config(format!("'{}' is not an ftp://host[:port]/path URL", d))
        })?),
        None => None,
    };

    let (host, port, dest, url_user, url_password) = match url {
        Some(u) => (u.host, u.port, u.path, u.user, u.password),
        None => {
            let host = target
                .auth
                .host
                .clone()
                .ok_or_else(|| SyncError::Config("no FTP host given".into()))?;
            let dest = target
                .dest
                .as_ref()
                .and_then(OneOrMany::first)
                .ok_or_else(|| SyncError::Config("no remote destination given".into()))?
                .to_string();
            (host, target.auth.port.unwrap_or(DEFAULT_FTP_PORT), dest, None, None)
        }
    };
    if host.trim().is_empty() {
        return Err(SyncError::Config("FTP host must not be empty".into()));
    }

    let dest_sep = match args.dest_sep.as_deref().or(target.dest_sep.as_deref()) {
        Some(s) => parse_dest_sep(s)?,
        None => DEFAULT_DEST_SEP,
    };

    let time_adjust_minutes = args
        .time_adjust
        .or(target.dest_time_adjustment_minutes)
        .unwrap_or(0);
    if !(-MAX_TIME_ADJUST_MINUTES..=MAX_TIME_ADJUST_MINUTES).contains(&time_adjust_minutes) {
        return Err(SyncError::Config(format!(
            "destTimeAdjustmentMinutes must be within +/-{}, got {}",
            MAX_TIME_ADJUST_MINUTES, time_adjust_minutes
        )));
    }

    let mut exclusions = target.exclusions.clone();
    exclusions.extend(args.exclusions.iter().cloned());
    let mut keep = target.keep.clone();
    keep.extend(args.keep.iter().cloned());

    let auth = AuthSettings {
        username: args
            .user
            .clone()
            .or(url_user)
            .or_else(|| target.auth.username.clone()),
        password: url_password.or_else(|| target.auth.password.clone()),
        auth_key: args
            .auth_key
            .clone()
            .or_else(|| target.auth.auth_key.clone()),
        auth_path: args
            .auth_file
            .clone()
            .or_else(|| target.auth.auth_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUTH_FILE)),
    };

    Ok(SyncConfig {
        host,
        port,
        src,
        dest,
        dest_sep,
        time_adjust_minutes,
        exclusions,
        keep,
        force_upload: args.force_upload || target.force_upload,
        verbose: args.verbose || target.force_verbose,
        mirror: args.mirror || target.sync_mode,
        timeout: Duration::from_secs(args.timeout.max(1)),
        auth,
    })
}
