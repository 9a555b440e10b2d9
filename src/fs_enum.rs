use crate::error::SyncError;
use glob::{MatchOptions, Pattern, PatternError};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use walkdir::WalkDir;
// Local tree enumeration and exclusion filtering

/// Relative directory key of the local tree. The root is the bare separator,
/// so joining it onto a remote root collapses to the remote root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelDir(String);

impl RelDir {
    pub fn root() -> Self {
        Self(MAIN_SEPARATOR.to_string())
    }

    /// Build a key from a path relative to the scan root ("" is the root).
    pub fn from_relative(path: &Path) -> Self {
        let s = path.to_string_lossy();
        if s.is_empty() {
            Self::root()
        } else {
            Self(s.into_owned())
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == MAIN_SEPARATOR.len_utf8() && self.0.starts_with(MAIN_SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of this directory under the local root.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        if self.is_root() {
            root.to_path_buf()
        } else {
            root.join(&self.0)
        }
    }
}

impl fmt::Display for RelDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directories of the local tree, in discovery order, each with the plain
/// files it directly contains. Built once per run and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct LocalTreeIndex {
    dirs: Vec<(RelDir, Vec<String>)>,
    positions: HashMap<RelDir, usize>,
}

impl LocalTreeIndex {
    fn ensure_dir(&mut self, dir: RelDir) -> usize {
        if let Some(&pos) = self.positions.get(&dir) {
            return pos;
        }
        let pos = self.dirs.len();
        self.positions.insert(dir.clone(), pos);
        self.dirs.push((dir, Vec::new()));
        pos
    }

    fn push_file(&mut self, dir: RelDir, name: String) {
        let pos = self.ensure_dir(dir);
        self.dirs[pos].1.push(name);
    }

    /// Number of directories (the root included).
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.dirs.iter().map(|(_, files)| files.len()).sum()
    }

    pub fn files(&self, dir: &RelDir) -> Option<&[String]> {
        self.positions
            .get(dir)
            .map(|&pos| self.dirs[pos].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelDir, &[String])> {
        self.dirs.iter().map(|(dir, files)| (dir, files.as_slice()))
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Ordered glob patterns. A pattern without a separator is matched against
/// the base name; any other pattern is matched against the whole path.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<(Pattern, bool)>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let raw = p.as_ref();
                let has_sep = raw.contains('/') || raw.contains(MAIN_SEPARATOR);
                Pattern::new(raw).map(|pat| (pat, has_sep))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        let base = path
            .rsplit(|c| c == '/' || c == MAIN_SEPARATOR)
            .find(|s| !s.is_empty())
            .unwrap_or(path);

        self.patterns.iter().any(|(pattern, has_sep)| {
            if *has_sep {
                pattern.matches_with(path, MATCH_OPTIONS)
            } else {
                pattern.matches_with(base, MATCH_OPTIONS)
            }
        })
    }
}

/// Check an entry against the exclusions by full path and by root-relative path.
fn is_excluded(path: &Path, root: &Path, exclusions: &PatternSet) -> bool {
    if exclusions.is_empty() {
        return false;
    }
    if exclusions.matches(&path.to_string_lossy()) {
        return true;
    }
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel_slashed = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    !rel_slashed.is_empty() && exclusions.matches(&rel_slashed)
}

/// Walk `root` and index every non-excluded directory and file.
///
/// Excluded directories are pruned, so nothing below them is visited.
/// Entries that cannot be read are skipped.
pub fn scan_local_tree(root: &Path, exclusions: &PatternSet) -> Result<LocalTreeIndex, SyncError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(SyncError::InvalidRoot(root.to_path_buf())),
    }

    let mut index = LocalTreeIndex::default();
    index.ensure_dir(RelDir::root());

    for entry in WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path(), root, exclusions))
        .filter_map(|e| e.ok())
    {
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());

        if entry.file_type().is_dir() {
            index.ensure_dir(RelDir::from_relative(rel));
        } else if entry.file_type().is_file() {
            let parent = rel.parent().unwrap_or_else(|| Path::new(""));
            let name = entry.file_name().to_string_lossy().into_owned();
            index.push_file(RelDir::from_relative(parent), name);
        }
    }

    Ok(index)
}
