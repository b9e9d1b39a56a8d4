//! Batch compilation driver.
//!
//! A `BatchContext` owns the compile cache for a sequence of builds and
//! runs one batch at a time: select entries, build the import graph,
//! partition by cache key, dispatch the misses to the worker pool, and
//! report one result per entry. An entry's failure never aborts its
//! siblings; the batch always returns a complete result set.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::{compute_key, CacheEntry, CacheKey, CompileCache, DiskCache};
use crate::compiler::{CompileRequest, StylesheetCompiler};
use crate::config::BuildOptions;
use crate::diagnostics::Diagnostic;
use crate::graph::DependencyGraph;
use crate::source::{BuildTarget, FileSet, SourceFile};

/// Compiled output for one successful entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutput {
    pub css: String,
    pub source_map: Option<String>,
    /// Transitive dependency paths in import order, for the host to watch
    pub dependencies: Vec<PathBuf>,
}

/// Outcome of one compilation unit: an eligible entry for the requested
/// target. Reported in entry order, never completion order.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub path: PathBuf,
    /// `None` when no key exists (resolution or cycle failure)
    pub key: Option<CacheKey>,
    /// Whether the outcome was served from a previous compilation
    pub from_cache: bool,
    pub outcome: Result<UnitOutput, Diagnostic>,
}

/// Everything one batch produced: one result per eligible entry, plus the
/// diagnostics of every failed unit in entry order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<UnitResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchOutcome {
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|unit| unit.outcome.is_err())
    }
}

/// Per-build context owning the compile cache. Construct one per project;
/// repeated or concurrent builds each get their own context, so no batch
/// can observe another's half-updated state.
pub struct BatchContext {
    options: BuildOptions,
    cache: CompileCache,
    disk: Option<DiskCache>,
}

/// Work item for one eligible entry after graph analysis.
enum UnitPlan {
    /// Closure and key computed; may be a cache hit or miss
    Keyed {
        path: PathBuf,
        key: CacheKey,
        closure: Vec<PathBuf>,
    },
    /// Resolution or cycle failure; no key exists for the unit
    Failed { path: PathBuf, diagnostic: Diagnostic },
}

impl BatchContext {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            cache: CompileCache::new(),
            disk: None,
        }
    }

    /// Context whose cache is preloaded from `base_dir/.kiln-cache` and
    /// persisted back at the end of every batch. An unreadable manifest
    /// degrades to an empty cache.
    pub fn with_disk_cache(base_dir: &Path, options: BuildOptions) -> Self {
        let disk = DiskCache::new(base_dir, &options);
        let cache = disk.load();
        Self {
            options,
            cache,
            disk: Some(disk),
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn cache(&self) -> &CompileCache {
        &self.cache
    }

    /// Compile every eligible entry in `files` for `target`.
    pub fn run_batch(
        &mut self,
        files: &FileSet,
        target: BuildTarget,
        compiler: &dyn StylesheetCompiler,
    ) -> BatchOutcome {
        let entries = files.entries_for(target);
        info!(
            entries = entries.len(),
            files = files.len(),
            ?target,
            "starting batch"
        );

        let mut graph = DependencyGraph::build(files, &self.options.include_paths);
        let plans: Vec<UnitPlan> = entries
            .iter()
            .map(|entry| self.plan_unit(files, entry, &mut graph))
            .collect();

        let misses: Vec<(&PathBuf, &CacheKey, &[PathBuf])> = plans
            .iter()
            .filter_map(|plan| match plan {
                UnitPlan::Keyed { path, key, closure } if self.cache.lookup(key).is_none() => {
                    Some((path, key, closure.as_slice()))
                }
                _ => None,
            })
            .collect();

        let keyed = plans
            .iter()
            .filter(|plan| matches!(plan, UnitPlan::Keyed { .. }))
            .count();
        if keyed > 0 {
            info!(
                "cache: {} of {} entries unchanged, {} need compilation",
                keyed - misses.len(),
                keyed,
                misses.len()
            );
        }

        // Join barrier: collect() waits for every dispatched unit. The only
        // cross-unit ordering is the per-key dedup inside get_or_compute.
        let compiled: FxHashMap<PathBuf, CacheEntry> = misses
            .into_par_iter()
            .map(|(path, key, closure)| {
                let entry = self.cache.get_or_compute(key, || {
                    debug!(entry = %path.display(), "compiling");
                    self.compile_unit(files, path, key, closure, compiler)
                });
                ((*path).clone(), entry)
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for plan in plans {
            let unit = match plan {
                UnitPlan::Failed { path, diagnostic } => UnitResult {
                    path,
                    key: None,
                    from_cache: false,
                    outcome: Err(diagnostic),
                },
                UnitPlan::Keyed { path, key, .. } => {
                    let from_cache = !compiled.contains_key(&path);
                    let entry = match compiled.get(&path) {
                        Some(entry) => entry.clone(),
                        // Hits were partitioned out above; the entry is
                        // still present because nothing evicts mid-batch.
                        None => self.cache.lookup(&key).expect("cache hit disappeared"),
                    };
                    UnitResult {
                        path,
                        key: Some(key),
                        from_cache,
                        outcome: unit_outcome(entry),
                    }
                }
            };
            if let Err(diagnostic) = &unit.outcome {
                outcome.diagnostics.push(diagnostic.clone());
            }
            outcome.results.push(unit);
        }

        if let Some(disk) = &self.disk {
            if let Err(e) = disk.save(&self.cache) {
                warn!("failed to persist compile cache: {e}");
            }
        }

        outcome
    }

    /// Resolve one entry's closure and key. Cycle and resolution failures
    /// surface here, before any compiler is involved.
    fn plan_unit(&self, files: &FileSet, entry: &SourceFile, graph: &mut DependencyGraph) -> UnitPlan {
        let closure = match graph.transitive_closure(&entry.path) {
            Ok(closure) => closure,
            Err(cycle) => {
                return UnitPlan::Failed {
                    path: entry.path.clone(),
                    diagnostic: Diagnostic::from(cycle),
                }
            }
        };

        if let Some(err) = graph.first_resolution_error(&entry.path, &closure) {
            return UnitPlan::Failed {
                path: entry.path.clone(),
                diagnostic: Diagnostic::from(err.clone()),
            };
        }

        let dependencies: Vec<&SourceFile> =
            closure.iter().filter_map(|path| files.get(path)).collect();
        // closure paths always come from the file set
        debug_assert_eq!(dependencies.len(), closure.len());

        UnitPlan::Keyed {
            path: entry.path.clone(),
            key: compute_key(entry, &dependencies, &self.options),
            closure,
        }
    }

    fn compile_unit(
        &self,
        files: &FileSet,
        path: &Path,
        key: &CacheKey,
        closure: &[PathBuf],
        compiler: &dyn StylesheetCompiler,
    ) -> CacheEntry {
        let entry = files
            .get(path)
            .expect("entry selected from this file set");
        let dependencies: Vec<&SourceFile> =
            closure.iter().filter_map(|dep| files.get(dep)).collect();

        let request = CompileRequest {
            entry,
            dependencies,
            options: &self.options,
        };
        match compiler.compile(&request) {
            Ok(style) => CacheEntry::success(
                key.clone(),
                style.css,
                style.source_map,
                closure.to_vec(),
            ),
            Err(err) => {
                let mut diagnostic = Diagnostic::from(err);
                if diagnostic.file.is_none() {
                    diagnostic = diagnostic.with_file(path);
                }
                CacheEntry::failure(key.clone(), diagnostic, closure.to_vec())
            }
        }
    }
}

fn unit_outcome(entry: CacheEntry) -> Result<UnitOutput, Diagnostic> {
    match entry.diagnostic {
        None => Ok(UnitOutput {
            css: entry.css.unwrap_or_default(),
            source_map: entry.source_map,
            dependencies: entry.dependencies,
        }),
        Some(diagnostic) => Err(diagnostic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::InlineCompiler;
    use crate::source::SourceFile;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content, BuildTarget::Neutral, true)
    }

    #[test]
    fn test_results_follow_entry_order() {
        let files: FileSet = [
            file("/app/b.scss", ".b {}"),
            file("/app/a.scss", ".a {}"),
        ]
        .into_iter()
        .collect();

        let mut ctx = BatchContext::new(BuildOptions::default());
        let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &InlineCompiler::new());

        let order: Vec<_> = outcome.results.iter().map(|u| u.path.clone()).collect();
        assert_eq!(order, vec![PathBuf::from("/app/b.scss"), PathBuf::from("/app/a.scss")]);
    }

    #[test]
    fn test_failure_does_not_abort_siblings() {
        let files: FileSet = [
            file("/app/broken.scss", "@import \"missing\";"),
            file("/app/fine.scss", ".fine {}"),
        ]
        .into_iter()
        .collect();

        let mut ctx = BatchContext::new(BuildOptions::default());
        let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &InlineCompiler::new());

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].outcome.is_err());
        assert!(outcome.results[1].outcome.is_ok());
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn test_resolution_failure_has_no_key() {
        let files: FileSet = [file("/app/broken.scss", "@use \"nowhere\";")]
            .into_iter()
            .collect();

        let mut ctx = BatchContext::new(BuildOptions::default());
        let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &InlineCompiler::new());

        assert!(outcome.results[0].key.is_none());
        assert!(!outcome.results[0].from_cache);
    }

    #[test]
    fn test_compiler_failure_is_cached() {
        let files: FileSet = [file("/app/broken.scss", ".a {")].into_iter().collect();

        let mut ctx = BatchContext::new(BuildOptions::default());
        let first = ctx.run_batch(&files, BuildTarget::Neutral, &InlineCompiler::new());
        assert!(!first.results[0].from_cache);
        assert!(first.results[0].outcome.is_err());

        let second = ctx.run_batch(&files, BuildTarget::Neutral, &InlineCompiler::new());
        assert!(second.results[0].from_cache);
        assert!(second.results[0].outcome.is_err());
    }
}
