//! Import resolution against the current file set.
//!
//! Resolution is purely lexical: candidate paths are joined and normalized,
//! then looked up in the `FileSet` the host supplied. The filesystem is
//! never touched.

use std::path::{Component, Path, PathBuf};

use crate::errors::ResolutionError;
use crate::source::{FileSet, PARTIAL_PREFIX, STYLESHEET_EXTENSIONS};

/// Outcome of resolving one import reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The reference maps to a file in the current file set.
    Source(PathBuf),
    /// Recognized external form (`sass:` module, URL, plain CSS); left to
    /// the underlying compiler's own resolution.
    External,
}

pub struct ImportResolver<'a> {
    files: &'a FileSet,
    include_paths: &'a [PathBuf],
}

impl<'a> ImportResolver<'a> {
    pub fn new(files: &'a FileSet, include_paths: &'a [PathBuf]) -> Self {
        Self {
            files,
            include_paths,
        }
    }

    /// Resolve `reference` as written in `importer`. Base directories are
    /// tried in order: the importer's own directory, then each include
    /// path. Within a base the candidate order is fixed (see
    /// `candidate_paths`) and must not be reordered: a partial and a plain
    /// file may legally coexist under the same name, and the partial wins.
    pub fn resolve(&self, importer: &Path, reference: &str) -> Result<Resolved, ResolutionError> {
        if is_external(reference) {
            return Ok(Resolved::External);
        }

        let stripped = strip_extension(reference);

        let mut bases: Vec<&Path> = Vec::with_capacity(1 + self.include_paths.len());
        if let Some(parent) = importer.parent() {
            bases.push(parent);
        }
        bases.extend(self.include_paths.iter().map(PathBuf::as_path));

        for base in bases {
            for candidate in candidate_paths(base, stripped) {
                if self.files.contains(&candidate) {
                    return Ok(Resolved::Source(candidate));
                }
            }
        }

        Err(ResolutionError {
            reference: reference.to_string(),
            importer: importer.to_path_buf(),
        })
    }
}

/// Forms the underlying compiler resolves itself: built-in modules, URLs,
/// and plain CSS imports.
pub fn is_external(reference: &str) -> bool {
    reference.starts_with("sass:")
        || reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("//")
        || reference.starts_with("url(")
        || reference.ends_with(".css")
}

fn strip_extension(reference: &str) -> &str {
    for ext in STYLESHEET_EXTENSIONS {
        if let Some(stem) = reference
            .strip_suffix(ext)
            .and_then(|stem| stem.strip_suffix('.'))
        {
            return stem;
        }
    }
    reference
}

/// Candidate paths for `reference` under `base`, in resolution order:
/// partial file, plain file, then the same pair inside a self-named
/// directory (`lib/_lib.scss` for a reference `lib`). Extensions are tried
/// in `STYLESHEET_EXTENSIONS` order.
fn candidate_paths(base: &Path, reference: &str) -> Vec<PathBuf> {
    let joined = base.join(reference);
    let name = match joined.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => return Vec::new(),
    };
    let parent = joined.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut candidates = Vec::with_capacity(STYLESHEET_EXTENSIONS.len() * 4);
    for ext in STYLESHEET_EXTENSIONS {
        candidates.push(parent.join(format!("{PARTIAL_PREFIX}{name}.{ext}")));
    }
    for ext in STYLESHEET_EXTENSIONS {
        candidates.push(parent.join(format!("{name}.{ext}")));
    }
    for ext in STYLESHEET_EXTENSIONS {
        candidates.push(joined.join(format!("{PARTIAL_PREFIX}{name}.{ext}")));
    }
    for ext in STYLESHEET_EXTENSIONS {
        candidates.push(joined.join(format!("{name}.{ext}")));
    }

    candidates.iter().map(|path| normalize(path)).collect()
}

/// Lexical normalization: collapse `.` and `..` without consulting the
/// filesystem, so candidate paths compare equal to the logical paths the
/// host reported.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
