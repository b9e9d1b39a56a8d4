use serde::{Deserialize, Serialize};
use std::fmt;

use super::hash_options;
use crate::config::BuildOptions;
use crate::source::SourceFile;

/// Digest identifying one compilation: the entry's content, every
/// transitive dependency's path and content, and the active options.
/// Identical keys guarantee substitutable output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure function of its inputs: the same entry content, dependency list
/// and options always produce the same key. The entry's path is
/// deliberately not an input, so distinct entry files with identical
/// content and dependencies share one key (and one compilation).
pub fn compute_key(
    entry: &SourceFile,
    dependencies: &[&SourceFile],
    options: &BuildOptions,
) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(entry.content_hash.as_bytes());
    hasher.update(&[0]);
    for dep in dependencies {
        hasher.update(dep.path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(dep.content_hash.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(hash_options(options).as_bytes());
    CacheKey(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputStyle;
    use crate::source::BuildTarget;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content, BuildTarget::Neutral, true)
    }

    #[test]
    fn test_key_is_pure() {
        let entry = file("/app/main.scss", "@import \"a\";");
        let dep = file("/app/_a.scss", ".a {}");
        let options = BuildOptions::default();

        assert_eq!(
            compute_key(&entry, &[&dep], &options),
            compute_key(&entry, &[&dep], &options)
        );
    }

    #[test]
    fn test_key_changes_with_entry_content() {
        let options = BuildOptions::default();
        let a = file("/app/main.scss", ".a {}");
        let b = file("/app/main.scss", ".b {}");

        assert_ne!(compute_key(&a, &[], &options), compute_key(&b, &[], &options));
    }

    #[test]
    fn test_key_changes_with_dependency_content() {
        let options = BuildOptions::default();
        let entry = file("/app/main.scss", "@import \"a\";");
        let dep_v1 = file("/app/_a.scss", ".a { x: 1 }");
        let dep_v2 = file("/app/_a.scss", ".a { x: 2 }");

        assert_ne!(
            compute_key(&entry, &[&dep_v1], &options),
            compute_key(&entry, &[&dep_v2], &options)
        );
    }

    #[test]
    fn test_key_changes_with_dependency_set() {
        let options = BuildOptions::default();
        let entry = file("/app/main.scss", "");
        let dep = file("/app/_a.scss", "");

        assert_ne!(
            compute_key(&entry, &[], &options),
            compute_key(&entry, &[&dep], &options)
        );
    }

    #[test]
    fn test_key_changes_with_options() {
        let entry = file("/app/main.scss", ".a {}");
        let expanded = BuildOptions::default();
        let compact = BuildOptions {
            output_style: OutputStyle::Compact,
            ..BuildOptions::default()
        };

        assert_ne!(
            compute_key(&entry, &[], &expanded),
            compute_key(&entry, &[], &compact)
        );
    }

    #[test]
    fn test_identical_content_at_different_paths_shares_key() {
        let options = BuildOptions::default();
        let a = file("/app/one.scss", ".same {}");
        let b = file("/app/two.scss", ".same {}");

        assert_eq!(compute_key(&a, &[], &options), compute_key(&b, &[], &options));
    }
}
