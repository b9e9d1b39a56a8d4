use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::hash_content;

/// File names starting with this marker are importable only, never
/// compiled standalone.
pub const PARTIAL_PREFIX: char = '_';

/// Recognized stylesheet extensions, in resolution preference order.
pub const STYLESHEET_EXTENSIONS: &[&str] = &["scss", "sass"];

/// Build target a source file is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildTarget {
    #[serde(rename = "client")]
    Client,
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "neutral")]
    Neutral,
}

impl Default for BuildTarget {
    fn default() -> Self {
        BuildTarget::Neutral
    }
}

impl BuildTarget {
    /// Whether a file tagged with `self` participates in a batch for
    /// `requested`. Neutral files participate in every batch.
    pub fn matches(self, requested: BuildTarget) -> bool {
        self == BuildTarget::Neutral || self == requested
    }
}

impl std::str::FromStr for BuildTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(BuildTarget::Client),
            "server" => Ok(BuildTarget::Server),
            "neutral" => Ok(BuildTarget::Neutral),
            other => Err(format!(
                "invalid build target '{other}'; supported targets: client, server, neutral"
            )),
        }
    }
}

/// One stylesheet source file as reported by the host build system.
/// Identity is the absolute logical path; the content hash is recomputed
/// whenever the host reports new content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    /// Blake3 hex digest of the content
    pub content_hash: String,
    pub target: BuildTarget,
    /// Whether the host considers this file eligible as a top-level entry
    pub entry_candidate: bool,
}

impl SourceFile {
    pub fn new(
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        target: BuildTarget,
        entry_candidate: bool,
    ) -> Self {
        let content = content.into();
        let content_hash = hash_content(content.as_bytes());
        Self {
            path: path.into(),
            content,
            content_hash,
            target,
            entry_candidate,
        }
    }

    /// Construct with a host-supplied content hash, trusted as-is.
    pub fn with_hash(
        path: impl Into<PathBuf>,
        content: impl Into<String>,
        content_hash: impl Into<String>,
        target: BuildTarget,
        entry_candidate: bool,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            content_hash: content_hash.into(),
            target,
            entry_candidate,
        }
    }

    /// Whether the file name carries the partial marker.
    pub fn is_partial(&self) -> bool {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(PARTIAL_PREFIX))
            .unwrap_or(false)
    }

    /// Whether this file is compiled standalone in a batch for `target`.
    /// Partials are never entries, whatever the host says.
    pub fn is_entry_for(&self, target: BuildTarget) -> bool {
        self.entry_candidate && !self.is_partial() && self.target.matches(target)
    }
}

/// The current file set, in the order the host reported it. Insertion with
/// an existing path replaces the file (a change report); removal drops it
/// (a deletion report).
#[derive(Debug, Default)]
pub struct FileSet {
    files: FxHashMap<PathBuf, SourceFile>,
    order: Vec<PathBuf>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: SourceFile) {
        if self.files.insert(file.path.clone(), file.clone()).is_none() {
            self.order.push(file.path);
        }
    }

    pub fn remove(&mut self, path: &Path) -> Option<SourceFile> {
        let removed = self.files.remove(path);
        if removed.is_some() {
            self.order.retain(|p| p != path);
        }
        removed
    }

    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Files in the order the host reported them.
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.order.iter().filter_map(|path| self.files.get(path))
    }

    /// Eligible entry files for a batch, in reported order.
    pub fn entries_for(&self, target: BuildTarget) -> Vec<&SourceFile> {
        self.iter().filter(|file| file.is_entry_for(target)).collect()
    }
}

impl FromIterator<SourceFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = SourceFile>>(iter: I) -> Self {
        let mut set = FileSet::new();
        for file in iter {
            set.insert(file);
        }
        set
    }
}
