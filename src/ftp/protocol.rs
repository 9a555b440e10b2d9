//! Control-channel command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code

use super::error::{FtpError, FtpResult};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

/// One complete server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Codec over the two halves of one control connection.
pub struct FtpCodec {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl FtpCodec {
    pub fn from_tcp(stream: TcpStream) -> FtpResult<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Address of the server end; used when PASV hands back a useless host.
    pub fn peer_ip(&self) -> Option<std::net::IpAddr> {
        self.writer.peer_addr().ok().map(|a| a.ip())
    }

    pub fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn read_response(&mut self) -> FtpResult<FtpResponse> {
        read_response_from(&mut self.reader)
    }

    /// Send a command and return the reply, whatever its code.
    pub fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd)?;
        self.read_response()
    }

    /// Send a command and require a 2xx reply.
    pub fn expect_ok(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        let resp = self.execute(cmd)?;
        if !resp.is_completion() {
            return Err(FtpError::from_reply(resp.code, &resp.text()));
        }
        Ok(resp)
    }
}

/// Read one reply, following the `NNN-` ... `NNN ` multi-line rule.
pub fn read_response_from<R: BufRead>(reader: &mut R) -> FtpResult<FtpResponse> {
    let first = read_line_raw(reader)?;
    let code = parse_code(&first)?;
    let mut lines = vec![first.clone()];

    let is_multi = first.as_bytes().get(3) == Some(&b'-');
    if is_multi {
        let terminator = format!("{} ", code);
        loop {
            let next = read_line_raw(reader)?;
            let done = next.starts_with(&terminator) || next == code.to_string();
            lines.push(next);
            if done {
                break;
            }
        }
    }

    Ok(FtpResponse { code, lines })
}

fn read_line_raw<R: BufRead>(reader: &mut R) -> FtpResult<String> {
    let mut buf = String::new();
    let n = reader.read_line(&mut buf)?;
    if n == 0 {
        return Err(FtpError::disconnected("Server closed connection"));
    }
    Ok(buf.trim_end_matches(['\r', '\n']).to_string())
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (100..600).contains(c))
        .ok_or_else(|| FtpError::protocol_error(format!("Invalid reply code in: '{}'", line)))
}
