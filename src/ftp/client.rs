//! Blocking FTP client that owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → `authenticate()` (USER/PASS, FEAT probe,
//! TYPE I) → directory and file commands → `quit()`.

use super::data;
use super::error::{FtpError, FtpErrorKind, FtpResult};
use super::parser;
use super::protocol::{FtpCodec, FtpResponse};
use crate::transport::{RemoteEntry, Transport};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// Upload copy buffer (64 KiB).
const COPY_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
struct ServerFeatures {
    mlsd: bool,
    epsv: bool,
}

/// A single-connection FTP session.
pub struct FtpClient {
    timeout: Duration,
    codec: Option<FtpCodec>,
    features: ServerFeatures,
    /// Cleared once the server refuses EPSV so later transfers go straight to PASV.
    try_epsv: bool,
}

impl FtpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            codec: None,
            features: ServerFeatures::default(),
            try_epsv: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.codec.is_some()
    }

    fn codec(&mut self) -> FtpResult<&mut FtpCodec> {
        self.codec.as_mut().ok_or_else(FtpError::not_connected)
    }

    fn probe_features(&mut self) -> ServerFeatures {
        let resp = match self.codec().and_then(|c| c.execute("FEAT")) {
            Ok(r) if r.is_completion() => r,
            _ => return ServerFeatures::default(),
        };
        let raw: Vec<String> = resp
            .lines
            .iter()
            .skip(1)
            .filter(|l| !l.starts_with("211"))
            .map(|l| l.trim().to_uppercase())
            .collect();
        let has = |feat: &str| raw.iter().any(|l| l.starts_with(feat));
        ServerFeatures {
            mlsd: has("MLSD"),
            epsv: has("EPSV"),
        }
    }

    fn open_data_channel(&mut self) -> FtpResult<TcpStream> {
        let timeout = self.timeout;
        if self.try_epsv {
            let codec = self.codec()?;
            match data::open_epsv(codec, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) if e.code.is_some() => self.try_epsv = false,
                Err(e) => return Err(e),
            }
        }
        data::open_pasv(self.codec()?, timeout)
    }

    /// Open a data channel, send `cmd`, collect the body.
    fn retrieve_text(&mut self, cmd: &str) -> FtpResult<String> {
        let mut ds = self.open_data_channel()?;
        let codec = self.codec()?;
        let resp = codec.execute(cmd)?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let mut buf = Vec::new();
        ds.read_to_end(&mut buf)?;
        drop(ds);

        if resp.is_preliminary() {
            let done = codec.read_response()?;
            if !done.is_completion() {
                return Err(FtpError::from_reply(done.code, &done.text()));
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.codec()?.expect_ok(cmd)
    }
}

impl Transport for FtpClient {
    fn connect(&mut self, host: &str, port: u16) -> FtpResult<()> {
        if host.is_empty() {
            return Err(FtpError::connection_failed("Host must not be empty"));
        }
        let addrs: Vec<_> = (host, port)
            .to_socket_addrs()
            .map_err(|e| FtpError::connection_failed(format!("resolve {}: {}", host, e)))?
            .collect();

        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = stream.ok_or_else(|| {
            FtpError::connection_failed(match last_err {
                Some(e) => format!("{}:{}: {}", host, port, e),
                None => format!("{}:{}: no addresses", host, port),
            })
        })?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        let _ = stream.set_nodelay(true);

        let mut codec = FtpCodec::from_tcp(stream)?;
        let banner = codec.read_response()?;
        if !banner.is_completion() {
            return Err(FtpError::from_reply(banner.code, &banner.text()));
        }
        self.codec = Some(codec);
        Ok(())
    }

    fn authenticate(&mut self, username: &str, password: &str) -> FtpResult<()> {
        let codec = self.codec()?;
        let user_resp = codec.execute(&format!("USER {}", username))?;
        if user_resp.code == 331 || user_resp.code == 332 {
            let pass_resp = codec.execute(&format!("PASS {}", password))?;
            if !pass_resp.is_completion() {
                return Err(FtpError::auth_failed(format!("Login failed: {}", pass_resp.text()))
                    .with_code(pass_resp.code));
            }
        } else if !user_resp.is_completion() {
            return Err(FtpError::auth_failed(format!("USER rejected: {}", user_resp.text()))
                .with_code(user_resp.code));
        }

        self.features = self.probe_features();
        if !self.features.epsv {
            self.try_epsv = false;
        }
        self.expect_ok("TYPE I")?;
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> FtpResult<()> {
        let resp = self.codec()?.execute(&format!("CWD {}", path))?;
        if resp.is_completion() {
            return Ok(());
        }
        let mut err = FtpError::from_reply(resp.code, &resp.text());
        if resp.code == 550 && err.kind == FtpErrorKind::CommandRejected {
            err.kind = FtpErrorKind::NotFound;
        }
        Err(err)
    }

    fn make_directory(&mut self, path: &str) -> FtpResult<()> {
        self.expect_ok(&format!("MKD {}", path))?;
        Ok(())
    }

    fn list_directory(&mut self, path: &str) -> FtpResult<Vec<RemoteEntry>> {
        let cmd = if self.features.mlsd {
            format!("MLSD {}", path)
        } else {
            format!("LIST {}", path)
        };
        let body = self.retrieve_text(&cmd)?;
        Ok(parser::parse_listing(&body))
    }

    fn put_file(&mut self, local: &Path, remote_name: &str) -> FtpResult<u64> {
        let file = File::open(local)?;
        let mut ds = self.open_data_channel()?;
        let codec = self.codec()?;
        let resp = codec.execute(&format!("STOR {}", remote_name))?;
        if !resp.is_preliminary() && !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }

        let mut reader = BufReader::with_capacity(COPY_CHUNK, file);
        let mut buffer = vec![0u8; COPY_CHUNK];
        let mut total_bytes = 0u64;
        let copied: io::Result<()> = (|| {
            loop {
                let bytes_read = reader.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                ds.write_all(&buffer[..bytes_read])?;
                total_bytes += bytes_read as u64;
            }
            ds.flush()
        })();
        let _ = ds.shutdown(Shutdown::Write);
        drop(ds);

        // The completion reply must be drained even when the copy failed.
        let done = if resp.is_preliminary() {
            codec.read_response()?
        } else {
            resp
        };
        copied.map_err(|e| {
            FtpError::new(FtpErrorKind::TransferFailed, format!("{}: {}", local.display(), e))
        })?;
        if !done.is_completion() {
            return Err(FtpError::from_reply(done.code, &done.text()));
        }
        Ok(total_bytes)
    }

    fn delete_file(&mut self, path: &str) -> FtpResult<()> {
        self.expect_ok(&format!("DELE {}", path))?;
        Ok(())
    }

    fn remove_directory(&mut self, path: &str) -> FtpResult<()> {
        self.expect_ok(&format!("RMD {}", path))?;
        Ok(())
    }

    fn working_directory(&mut self) -> FtpResult<Option<String>> {
        let resp = self.expect_ok("PWD")?;
        parse_pwd(&resp.text()).map(Some)
    }

    fn quit(&mut self) -> FtpResult<()> {
        let mut codec = match self.codec.take() {
            Some(c) => c,
            None => return Ok(()),
        };
        let resp = codec.execute("QUIT")?;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(())
    }
}

/// Parse `257 "/some/path"` into the path string (`""` escapes a quote).
fn parse_pwd(text: &str) -> FtpResult<String> {
    let start = text
        .find('"')
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PWD: {}", text)))?;
    let mut out = String::new();
    let mut chars = text[start + 1..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
                continue;
            }
            return Ok(out);
        }
        out.push(c);
    }
    Err(FtpError::protocol_error(format!("Cannot parse PWD: {}", text)))
}
