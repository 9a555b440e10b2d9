#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ftpsync::ftp::{FtpError, FtpErrorKind, FtpResult};
use ftpsync::{RemoteEntry, Transport};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File {
        size: u64,
        modified: Option<DateTime<Utc>>,
    },
    Dir,
}

/// In-memory server: absolute `/`-separated paths to nodes, plus a log of
/// every command in wire-like form (`CWD /www`, `STOR a.txt`, ...).
#[derive(Debug)]
pub struct MemoryTransport {
    pub nodes: BTreeMap<String, Node>,
    pub cwd: String,
    pub ops: Vec<String>,
    pub connected: bool,
    pub home: Option<String>,

    pub refuse_connect: bool,
    pub reject_auth: bool,
    pub quit_fails: bool,
    pub fail_mkdir: HashSet<String>,
    pub fail_list: HashSet<String>,
    pub fail_put: HashSet<String>,
    pub fail_delete: HashSet<String>,
    /// Files that come back right after being deleted.
    pub sticky: HashSet<String>,
    /// Drop the connection on the first STOR.
    pub drop_on_put: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes,
            cwd: "/".to_string(),
            ops: Vec::new(),
            connected: false,
            home: None,
            refuse_connect: false,
            reject_auth: false,
            quit_fails: false,
            fail_mkdir: HashSet::new(),
            fail_list: HashSet::new(),
            fail_put: HashSet::new(),
            fail_delete: HashSet::new(),
            sticky: HashSet::new(),
            drop_on_put: false,
        }
    }
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => "/".to_string(),
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory and any missing parents.
    pub fn with_dir(mut self, path: &str) -> Self {
        self.add_dir(path);
        self
    }

    pub fn with_file(mut self, path: &str, size: u64, modified: i64) -> Self {
        self.add_dir(&parent_of(path));
        self.nodes.insert(
            path.to_string(),
            Node::File {
                size,
                modified: Some(at(modified)),
            },
        );
        self
    }

    fn add_dir(&mut self, path: &str) {
        let mut cur = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            cur.push('/');
            cur.push_str(part);
            self.nodes.entry(cur.clone()).or_insert(Node::Dir);
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.nodes.get(path), Some(Node::Dir))
    }

    /// Everything strictly below `path`.
    pub fn descendants(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        self.nodes
            .keys()
            .filter(|k| k.starts_with(&prefix) && k.as_str() != path)
            .cloned()
            .collect()
    }

    pub fn ops_starting(&self, verb: &str) -> Vec<String> {
        self.ops
            .iter()
            .filter(|op| op.starts_with(verb))
            .cloned()
            .collect()
    }

    fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else if self.cwd == "/" {
            format!("/{}", path)
        } else {
            format!("{}/{}", self.cwd, path)
        };
        if joined.len() > 1 {
            joined.trim_end_matches('/').to_string()
        } else {
            joined
        }
    }

    fn check_connected(&self) -> FtpResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(FtpError::not_connected())
        }
    }

    fn children(&self, dir: &str) -> Vec<RemoteEntry> {
        self.nodes
            .iter()
            .filter(|(k, _)| k.as_str() != "/" && parent_of(k) == dir)
            .map(|(k, node)| match node {
                Node::Dir => RemoteEntry::directory(name_of(k)),
                Node::File { size, modified } => RemoteEntry::file(name_of(k), *size, *modified),
            })
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, host: &str, port: u16) -> FtpResult<()> {
        self.ops.push(format!("CONNECT {}:{}", host, port));
        if self.refuse_connect {
            return Err(FtpError::connection_failed("connection refused"));
        }
        self.connected = true;
        Ok(())
    }

    fn authenticate(&mut self, username: &str, _password: &str) -> FtpResult<()> {
        self.check_connected()?;
        self.ops.push(format!("USER {}", username));
        if self.reject_auth {
            return Err(FtpError::from_reply(530, "Login incorrect."));
        }
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        self.check_connected()?;
        let full = self.resolve(path);
        self.ops.push(format!("CWD {}", full));
        if self.is_dir(&full) {
            self.cwd = full;
            Ok(())
        } else {
            Err(FtpError::not_found(format!("{}: No such directory", full)))
        }
    }

    fn make_directory(&mut self, path: &str) -> FtpResult<()> {
        self.check_connected()?;
        let full = self.resolve(path);
        self.ops.push(format!("MKD {}", full));
        if self.fail_mkdir.contains(&full) || self.exists(&full) || !self.is_dir(&parent_of(&full)) {
            return Err(FtpError::from_reply(550, "Create directory operation failed."));
        }
        self.nodes.insert(full, Node::Dir);
        Ok(())
    }

    fn list_directory(&mut self, path: &str) -> FtpResult<Vec<RemoteEntry>> {
        self.check_connected()?;
        let full = self.resolve(path);
        self.ops.push(format!("LIST {}", full));
        if self.fail_list.contains(&full) {
            return Err(FtpError::from_reply(450, "Listing unavailable."));
        }
        Ok(self.children(&full))
    }

    fn put_file(&mut self, local: &Path, remote_name: &str) -> FtpResult<u64> {
        self.check_connected()?;
        let full = self.resolve(remote_name);
        self.ops.push(format!("STOR {}", full));
        if self.drop_on_put {
            self.connected = false;
            return Err(FtpError::disconnected("connection reset"));
        }
        if self.fail_put.contains(&full) {
            return Err(FtpError::from_reply(553, "Could not create file."));
        }
        let meta = fs::metadata(local)?;
        // Stamped with the local time, as servers that keep upload times do.
        let modified: DateTime<Utc> = meta.modified()?.into();
        self.nodes.insert(
            full,
            Node::File {
                size: meta.len(),
                modified: Some(modified),
            },
        );
        Ok(meta.len())
    }

    fn delete_file(&mut self, path: &str) -> FtpResult<()> {
        self.check_connected()?;
        let full = self.resolve(path);
        self.ops.push(format!("DELE {}", full));
        if self.fail_delete.contains(&full) {
            return Err(FtpError::from_reply(550, "Permission denied."));
        }
        match self.nodes.get(&full) {
            Some(Node::File { .. }) => {
                if !self.sticky.contains(&full) {
                    self.nodes.remove(&full);
                }
                Ok(())
            }
            _ => Err(FtpError::not_found(format!("{}: not a file", full))),
        }
    }

    fn remove_directory(&mut self, path: &str) -> FtpResult<()> {
        self.check_connected()?;
        let full = self.resolve(path);
        self.ops.push(format!("RMD {}", full));
        if !self.is_dir(&full) || !self.descendants(&full).is_empty() {
            return Err(FtpError::from_reply(550, "Remove directory operation failed."));
        }
        self.nodes.remove(&full);
        Ok(())
    }

    fn working_directory(&mut self) -> FtpResult<Option<String>> {
        Ok(self.home.clone())
    }

    fn quit(&mut self) -> FtpResult<()> {
        self.ops.push("QUIT".to_string());
        if !self.connected {
            return Err(FtpError::new(FtpErrorKind::Disconnected, "not connected"));
        }
        self.connected = false;
        if self.quit_fails {
            return Err(FtpError::disconnected("connection reset"));
        }
        Ok(())
    }
}

/// Create `rel` under `root` with `len` bytes and the given mtime.
pub fn write_local(root: &Path, rel: &str, len: usize, mtime: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, vec![b'x'; len]).unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(mtime, 0)).unwrap();
}
