//! LIST / MLSD response parser.
//!
//! Supports three formats:
//! 1. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//! 2. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//! 3. **Windows/IIS-style**: `01-01-26  12:00AM       1234 file.txt`
//!
//! Lines that match none of them are dropped; a row without a trustworthy
//! name is worse than no row for deletion decisions.

use crate::transport::{RemoteEntry, RemoteEntryKind};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9})[+@.]?\s+  # permissions
        (\d+)\s+                           # link count
        (\S+)\s+                           # owner
        (\S+)\s+                           # group
        (\d+)\s+                           # size
        (\w{3}\s+\d{1,2}\s+[\d:]+)\s       # date
        (.+)$                              # filename (possibly with -> target)
        ",
    )
    .unwrap();
    static ref WINDOWS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2,4})\s+          # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+       # time
        (<DIR>|\d+)\s+                     # size or <DIR>
        (.+)$                              # filename
        ",
    )
    .unwrap();
}

/// Parse a full LIST or MLSD body.
pub fn parse_listing(raw: &str) -> Vec<RemoteEntry> {
    parse_listing_at(raw, Utc::now())
}

/// Same as [`parse_listing`] with an explicit "now" for year inference.
pub fn parse_listing_at(raw: &str, now: DateTime<Utc>) -> Vec<RemoteEntry> {
    raw.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .filter(|l| !l.starts_with("total "))
        .filter_map(|line| parse_line(line, now))
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

fn parse_line(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    if line.contains(';') && line.contains('=') {
        if let Some(e) = parse_mlsd(line) {
            return Some(e);
        }
    }
    parse_unix(line, now).or_else(|| parse_windows(line))
}

// ─── MLSD ────────────────────────────────────────────────────────────

fn parse_mlsd(line: &str) -> Option<RemoteEntry> {
    // Facts end at the first "; "; the rest is the name, spaces included.
    let (facts_str, name) = line.split_once("; ")?;
    if name.is_empty() {
        return None;
    }

    let mut kind = RemoteEntryKind::Other;
    let mut size = 0;
    let mut modified = None;
    for fact in facts_str.split(';') {
        let Some((k, v)) = fact.trim().split_once('=') else {
            continue;
        };
        match k.to_ascii_lowercase().as_str() {
            "type" => {
                kind = match v.to_ascii_lowercase().as_str() {
                    "file" => RemoteEntryKind::File,
                    "dir" => RemoteEntryKind::Directory,
                    // cdir/pdir are the listed directory and its parent
                    "cdir" | "pdir" => return None,
                    _ => RemoteEntryKind::Other,
                }
            }
            "size" => size = v.parse().unwrap_or(0),
            "modify" => modified = parse_mlsd_time(v),
            _ => {}
        }
    }

    Some(RemoteEntry {
        name: name.to_string(),
        kind,
        size,
        modified,
    })
}

/// `YYYYMMDDHHmmSS[.fraction]`, always UTC.
fn parse_mlsd_time(s: &str) -> Option<DateTime<Utc>> {
    let base = s.get(..14)?;
    NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

// ─── Unix ────────────────────────────────────────────────────────────

fn parse_unix(line: &str, now: DateTime<Utc>) -> Option<RemoteEntry> {
    let caps = UNIX_RE.captures(line)?;

    let perms = caps.get(1)?.as_str();
    let size = caps.get(5)?.as_str().parse::<u64>().unwrap_or(0);
    let date_str = caps.get(6)?.as_str();
    let name_raw = caps.get(7)?.as_str().trim_start();

    let kind = match perms.as_bytes().first() {
        Some(b'd') => RemoteEntryKind::Directory,
        Some(b'-') => RemoteEntryKind::File,
        _ => RemoteEntryKind::Other,
    };

    let name = match (kind, name_raw.find(" -> ")) {
        (RemoteEntryKind::Other, Some(pos)) => &name_raw[..pos],
        _ => name_raw,
    };

    Some(RemoteEntry {
        name: name.to_string(),
        kind,
        size,
        modified: parse_unix_date(date_str, now),
    })
}

/// "Jan  1 12:00" (within the last six months) or "Jan  1  2025".
fn parse_unix_date(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalised = s.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalised.contains(':') {
        let year = now.year();
        let dt = NaiveDateTime::parse_from_str(
            &format!("{} {}", year, normalised),
            "%Y %b %d %H:%M",
        )
        .ok()?;
        let dt = Utc.from_utc_datetime(&dt);
        // Yearless dates are the most recent past occurrence.
        if dt > now + Duration::days(1) {
            let prev = NaiveDateTime::parse_from_str(
                &format!("{} {}", year - 1, normalised),
                "%Y %b %d %H:%M",
            )
            .ok()?;
            return Some(Utc.from_utc_datetime(&prev));
        }
        return Some(dt);
    }

    let date = NaiveDate::parse_from_str(&normalised, "%b %d %Y").ok()?;
    Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

// ─── Windows / IIS ───────────────────────────────────────────────────

fn parse_windows(line: &str) -> Option<RemoteEntry> {
    let caps = WINDOWS_RE.captures(line)?;

    let date_str = caps.get(1)?.as_str();
    let time_str = caps.get(2)?.as_str();
    let size_or_dir = caps.get(3)?.as_str();
    let name = caps.get(4)?.as_str().to_string();

    let (kind, size) = if size_or_dir == "<DIR>" {
        (RemoteEntryKind::Directory, 0)
    } else {
        (RemoteEntryKind::File, size_or_dir.parse::<u64>().unwrap_or(0))
    };

    Some(RemoteEntry {
        name,
        kind,
        size,
        modified: parse_windows_date(date_str, time_str),
    })
}

fn parse_windows_date(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    ["%m-%d-%y %I:%M%p", "%m-%d-%y %H:%M", "%m-%d-%Y %I:%M%p", "%m-%d-%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&combined, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}
