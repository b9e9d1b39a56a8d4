use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{
    hash_options, CacheEntry, CacheError, CacheKey, CompileCache, Result, CACHE_DIR_NAME,
    CACHE_VERSION, MANIFEST_FILE_NAME,
};
use crate::config::BuildOptions;

/// Persisted cache manifest. Entries from a manifest written with different
/// options would all be unreachable anyway (options feed every key), so the
/// options hash check just skips deserializing a useless map.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    options_hash: String,
    entries: FxHashMap<CacheKey, CacheEntry>,
}

/// Durable storage for the compile cache, carrying entries across process
/// restarts. Any problem reading the manifest degrades to an empty cache;
/// persistence is never allowed to fail a batch.
pub struct DiskCache {
    cache_dir: PathBuf,
    manifest_path: PathBuf,
    options_hash: String,
}

impl DiskCache {
    /// The manifest lives at `base_dir/.kiln-cache/manifest.bin`.
    pub fn new(base_dir: &Path, options: &BuildOptions) -> Self {
        let cache_dir = base_dir.join(CACHE_DIR_NAME);
        let manifest_path = cache_dir.join(MANIFEST_FILE_NAME);
        Self {
            cache_dir,
            manifest_path,
            options_hash: hash_options(options),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Load the persisted entries, degrading to an empty cache when the
    /// manifest is missing, unreadable, corrupted, or written by a
    /// different cache version or option set.
    pub fn load(&self) -> CompileCache {
        match self.try_load() {
            Ok(manifest) => {
                info!(entries = manifest.entries.len(), "loaded compile cache");
                CompileCache::from_entries(manifest.entries.into_values())
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                CompileCache::new()
            }
            Err(e) => {
                warn!("ignoring unusable compile cache: {e}");
                CompileCache::new()
            }
        }
    }

    fn try_load(&self) -> Result<Manifest> {
        let bytes = std::fs::read(&self.manifest_path)?;
        let manifest: Manifest = bincode::deserialize(&bytes)?;

        if manifest.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_VERSION,
                found: manifest.version,
            });
        }
        if manifest.options_hash != self.options_hash {
            return Err(CacheError::OptionsMismatch);
        }

        Ok(manifest)
    }

    /// Write the current entries as a fresh manifest. The write goes to a
    /// temporary file first and is renamed into place, so a crash mid-save
    /// leaves the previous manifest intact rather than a torn one.
    pub fn save(&self, cache: &CompileCache) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;

        let manifest = Manifest {
            version: CACHE_VERSION,
            options_hash: self.options_hash.clone(),
            entries: cache
                .snapshot()
                .into_iter()
                .map(|entry| (entry.key.clone(), entry))
                .collect(),
        };
        let bytes = bincode::serialize(&manifest)?;

        let tmp_path = self.manifest_path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &self.manifest_path)?;

        info!(entries = manifest.entries.len(), "saved compile cache");
        Ok(())
    }
}
