//! Passive data channels.
//!
//! - **EPSV** (RFC 2428) - server opens a port on the control host
//! - **PASV** (RFC 959) - server opens a port and names the address
//!
//! Active mode is not offered; passive works through client-side NAT.

use super::error::{FtpError, FtpResult};
use super::protocol::FtpCodec;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

lazy_static! {
    static ref PASV_RE: Regex =
        Regex::new(r"(\d+),\s*(\d+),\s*(\d+),\s*(\d+),\s*(\d+),\s*(\d+)").unwrap();
    static ref EPSV_RE: Regex = Regex::new(r"\(([^\d\s])([^\d\s])([^\d\s])(\d+)([^\d\s])\)").unwrap();
}

/// Issue `EPSV` and connect to the announced port on the control host.
pub fn open_epsv(codec: &mut FtpCodec, timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("EPSV")?;
    let port = parse_epsv_response(&resp.text())?;
    let ip = codec
        .peer_ip()
        .ok_or_else(|| FtpError::data_channel("control connection has no peer address"))?;
    connect(SocketAddr::new(ip, port), timeout)
}

/// Issue `PASV` and connect to the announced address.
pub fn open_pasv(codec: &mut FtpCodec, timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect_ok("PASV")?;
    let announced = parse_pasv_response(&resp.text())?;
    let addr = match codec.peer_ip() {
        Some(peer) => SocketAddr::new(pick_pasv_host(announced.ip(), peer), announced.port()),
        None => announced,
    };
    connect(addr, timeout)
}

fn connect(addr: SocketAddr, timeout: Duration) -> FtpResult<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| FtpError::data_channel(format!("data connect to {}: {}", addr, e)))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(stream)
}

/// Servers behind NAT often announce an address the client cannot reach;
/// fall back to the control peer in that case.
fn pick_pasv_host(announced: IpAddr, peer: IpAddr) -> IpAddr {
    let unreachable = match (announced, peer) {
        (IpAddr::V4(a), _) if a.is_unspecified() => true,
        (IpAddr::V4(a), IpAddr::V4(p)) => {
            (a.is_private() || a.is_loopback()) && !(p.is_private() || p.is_loopback())
        }
        _ => false,
    };
    if unreachable {
        peer
    } else {
        announced
    }
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
pub fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

/// Parse `(|||port|)` from a 229 response.
pub fn parse_epsv_response(text: &str) -> FtpResult<u16> {
    let caps = EPSV_RE
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse EPSV: {}", text)))?;
    caps[4]
        .parse::<u16>()
        .map_err(|_| FtpError::protocol_error("EPSV port out of range"))
}
