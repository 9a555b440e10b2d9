//! URL parsing for ftp:// destinations

/// Control port used when the URL names none.
pub const DEFAULT_FTP_PORT: u16 = 21;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDest {
    pub host: String,
    pub port: u16,
    /// Remote root, always absolute.
    pub path: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Parse `ftp://[user[:password]@]host[:port]/path`. Returns `None` for anything else,
/// including a port that is not a number.
pub fn parse_remote_url(s: &str) -> Option<RemoteDest> {
    let s_trim = s.trim();
    let lower = s_trim.to_ascii_lowercase();
    let scheme_end = lower.find(':')?;
    if &lower[..=scheme_end] != "ftp:" {
        return None;
    }
    let rest = s_trim[scheme_end + 1..].strip_prefix("//")?;
    let (authority, p) = rest.split_once('/').unwrap_or((rest, ""));

    let (userinfo, hp) = match authority.rsplit_once('@') {
        Some((u, hp)) => (u, hp),
        None => ("", authority),
    };
    let (user, password) = match userinfo.split_once(':') {
        Some((u, pw)) => (u, Some(pw.to_string())),
        None => (userinfo, None),
    };
    let user = if user.is_empty() { None } else { Some(user.to_string()) };
    if hp.is_empty() {
        return None;
    }

    let (host, port) = if let Some(bracketed) = hp.strip_prefix('[') {
        // [v6addr] or [v6addr]:port
        let (h, tail) = bracketed.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(pr) => pr.parse().ok()?,
            None if tail.is_empty() => DEFAULT_FTP_PORT,
            None => return None,
        };
        (h.to_string(), port)
    } else {
        match hp.split_once(':') {
            Some((h, pr)) => (h.to_string(), pr.parse().ok()?),
            None => (hp.to_string(), DEFAULT_FTP_PORT),
        }
    };
    if host.is_empty() {
        return None;
    }

    Some(RemoteDest {
        host,
        port,
        path: format!("/{}", p),
        user,
        password,
    })
}
