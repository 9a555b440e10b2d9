use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

pub trait Logger: Send + Sync {
    fn start(&self, _src: &Path, _dest: &str) {}
    fn connected(&self, _host: &str, _port: u16) {}
    fn mkdir(&self, _remote: &str) {}
    fn upload_done(&self, _local: &Path, _remote: &str, _bytes: u64) {}
    fn unchanged(&self, _local: &Path) {}
    fn delete(&self, _remote: &str) {}
    fn rmdir(&self, _remote: &str) {}
    fn warning(&self, _context: &str, _msg: &str) {}
    fn error(&self, _context: &str, _path: &str, _msg: &str) {}
    fn done(&self, _checked: u64, _uploaded: u64, _deleted: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Appends one timestamped line per event, tagged with the run id.
pub struct TextLogger {
    file: Mutex<File>,
    run_id: String,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
            run_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] run={} {}", Utc::now().to_rfc3339(), self.run_id, s);
        }
    }
}

impl Logger for TextLogger {
    fn start(&self, src: &Path, dest: &str) {
        self.line(&format!("START src={} dest={}", src.display(), dest));
    }
    fn connected(&self, host: &str, port: u16) {
        self.line(&format!("CONNECT host={} port={}", host, port));
    }
    fn mkdir(&self, remote: &str) {
        self.line(&format!("MKDIR path={}", remote));
    }
    fn upload_done(&self, local: &Path, remote: &str, bytes: u64) {
        self.line(&format!(
            "UPLOAD src={} dest={} bytes={}",
            local.display(),
            remote,
            bytes
        ));
    }
    fn unchanged(&self, local: &Path) {
        self.line(&format!("SKIP src={}", local.display()));
    }
    fn delete(&self, remote: &str) {
        self.line(&format!("DELETE path={}", remote));
    }
    fn rmdir(&self, remote: &str) {
        self.line(&format!("RMDIR path={}", remote));
    }
    fn warning(&self, context: &str, msg: &str) {
        self.line(&format!("WARN ctx={} msg={}", context, msg));
    }
    fn error(&self, context: &str, path: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} path={} msg={}", context, path, msg));
    }
    fn done(&self, checked: u64, uploaded: u64, deleted: u64, seconds: f64) {
        self.line(&format!(
            "DONE checked={checked} uploaded={uploaded} deleted={deleted} seconds={seconds:.3}"
        ));
    }
}
