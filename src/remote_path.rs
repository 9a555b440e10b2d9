//! Remote path construction
//!
//! Local relative paths are written with the platform separator, remote
//! paths with the configured destination separator. Everything here is a
//! pure string transformation: no I/O, no environment lookups beyond the
//! two separators the translator was built with.

use std::path::MAIN_SEPARATOR;

/// Translates between local path conventions and the remote separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTranslator {
    local_sep: char,
    dest_sep: char,
}

impl PathTranslator {
    /// Translator for this platform's separator and the given remote one.
    pub fn new(dest_sep: char) -> Self {
        Self::with_local_sep(MAIN_SEPARATOR, dest_sep)
    }

    /// Translator with an explicit local separator (lets Windows rules be
    /// exercised on any host).
    pub fn with_local_sep(local_sep: char, dest_sep: char) -> Self {
        Self {
            local_sep,
            dest_sep,
        }
    }

    pub fn dest_sep(&self) -> char {
        self.dest_sep
    }

    /// Collapse redundant separators and `.`/`..` segments using local rules,
    /// then rewrite local separators to the destination separator.
    pub fn normalize(&self, path: &str) -> String {
        let normalized = normalize_lexically(path, self.local_sep);
        self.to_dest(&normalized)
    }

    /// Join parts with the destination separator, collapse doubled
    /// separators and trim one trailing separator (a lone root is kept).
    pub fn join<S: AsRef<str>>(&self, parts: &[S]) -> String {
        let sep = self.dest_sep.to_string();
        let joined = parts
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(&sep);

        let mut joined = self.to_dest(&joined);
        let doubled = sep.repeat(2);
        while joined.contains(&doubled) {
            joined = joined.replace(&doubled, &sep);
        }

        if joined.len() > sep.len() && joined.ends_with(self.dest_sep) {
            joined.pop();
        }
        joined
    }

    /// Rewrite a remote path back to local separators.
    pub fn to_local(&self, path: &str) -> String {
        if self.local_sep == self.dest_sep {
            return path.to_string();
        }
        path.replace(self.dest_sep, &self.local_sep.to_string())
    }

    fn to_dest(&self, path: &str) -> String {
        if self.local_sep == self.dest_sep {
            return path.to_string();
        }
        let mut out = path.replace(self.local_sep, &self.dest_sep.to_string());
        // Windows accepts '/' as well; keep the output uniform.
        if self.local_sep == '\\' && self.dest_sep != '/' {
            out = out.replace('/', &self.dest_sep.to_string());
        }
        out
    }
}

impl Default for PathTranslator {
    fn default() -> Self {
        Self::new('/')
    }
}

fn is_local_sep(c: char, local_sep: char) -> bool {
    c == local_sep || (local_sep == '\\' && c == '/')
}

/// Lexical normalization: no filesystem access, symlinks are not resolved.
fn normalize_lexically(path: &str, local_sep: char) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with(|c| is_local_sep(c, local_sep));
    let trailing = path.ends_with(|c| is_local_sep(c, local_sep));

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(|c| is_local_sep(c, local_sep)) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let sep = local_sep.to_string();
    let body = segments.join(&sep);
    let mut out = String::with_capacity(path.len());
    if absolute {
        out.push(local_sep);
    }
    out.push_str(&body);

    if out.is_empty() {
        out.push('.');
    }
    if trailing && (!body.is_empty() || !absolute) {
        out.push(local_sep);
    }
    out
}
