use crate::config::BuildOptions;

/// Compute the Blake3 hash of raw content bytes
/// Blake3 is fast enough to hash every file on every batch
pub fn hash_content(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash the compile options to detect option changes
/// Any change in options must change every cache key
pub fn hash_options(options: &BuildOptions) -> String {
    // Serialize options to JSON for stable hashing
    let json = serde_json::to_string(options).expect("Failed to serialize options");
    hash_content(json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputStyle;

    #[test]
    fn test_hash_content_consistency() {
        assert_eq!(hash_content(b"body {}"), hash_content(b"body {}"));
    }

    #[test]
    fn test_hash_content_different_content() {
        assert_ne!(hash_content(b"a {}"), hash_content(b"b {}"));
    }

    #[test]
    fn test_hash_options_sensitive_to_every_field() {
        let base = BuildOptions::default();

        let mut styled = base.clone();
        styled.output_style = OutputStyle::Compact;
        assert_ne!(hash_options(&base), hash_options(&styled));

        let mut mapped = base.clone();
        mapped.source_maps = true;
        assert_ne!(hash_options(&base), hash_options(&mapped));

        let mut pathed = base.clone();
        pathed.include_paths.push("lib".into());
        assert_ne!(hash_options(&base), hash_options(&pathed));
    }
}
