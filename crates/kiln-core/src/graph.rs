//! Per-batch import graph.
//!
//! Built fresh from the current file set for every batch; only the compile
//! cache persists across builds. Unresolved imports are recorded per file
//! rather than aborting construction, so the failure surfaces only for
//! entries whose closure actually reaches the broken file.

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{CycleError, ResolutionError};
use crate::imports::scan_imports;
use crate::resolver::{ImportResolver, Resolved};
use crate::source::FileSet;

pub struct DependencyGraph {
    /// importer -> direct imports, in reference order
    edges: FxHashMap<PathBuf, Vec<PathBuf>>,
    /// first unresolved import per file
    resolution_errors: FxHashMap<PathBuf, ResolutionError>,
    /// memoized successful closures, valid for this graph's lifetime
    closures: FxHashMap<PathBuf, Vec<PathBuf>>,
}

impl DependencyGraph {
    /// Scan every file for import references and resolve them against the
    /// file set.
    pub fn build(files: &FileSet, include_paths: &[PathBuf]) -> Self {
        let resolver = ImportResolver::new(files, include_paths);
        let mut edges: FxHashMap<PathBuf, Vec<PathBuf>> = FxHashMap::default();
        let mut resolution_errors = FxHashMap::default();

        for file in files.iter() {
            let mut imports = Vec::new();
            for import in scan_imports(&file.content) {
                match resolver.resolve(&file.path, &import.reference) {
                    Ok(Resolved::Source(path)) => imports.push(path),
                    Ok(Resolved::External) => {}
                    Err(err) => {
                        debug!(
                            file = %file.path.display(),
                            reference = %import.reference,
                            "unresolved import"
                        );
                        resolution_errors.entry(file.path.clone()).or_insert(err);
                    }
                }
            }
            edges.insert(file.path.clone(), imports);
        }

        Self {
            edges,
            resolution_errors,
            closures: FxHashMap::default(),
        }
    }

    pub fn direct_imports(&self, path: &Path) -> &[PathBuf] {
        self.edges.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn resolution_error(&self, path: &Path) -> Option<&ResolutionError> {
        self.resolution_errors.get(path)
    }

    /// First unresolved import among `entry` and its transitive imports.
    pub fn first_resolution_error(
        &self,
        entry: &Path,
        closure: &[PathBuf],
    ) -> Option<&ResolutionError> {
        self.resolution_error(entry)
            .or_else(|| closure.iter().find_map(|path| self.resolution_error(path)))
    }

    /// Every file reachable from `entry` by following imports, in import
    /// order and excluding the entry itself. Successful closures are
    /// memoized for the lifetime of the graph.
    pub fn transitive_closure(&mut self, entry: &Path) -> Result<Vec<PathBuf>, CycleError> {
        if let Some(cached) = self.closures.get(entry) {
            return Ok(cached.clone());
        }

        let mut stack = vec![entry.to_path_buf()];
        let mut closure = IndexSet::new();
        self.visit(entry, &mut stack, &mut closure)?;

        let closure: Vec<PathBuf> = closure.into_iter().collect();
        self.closures.insert(entry.to_path_buf(), closure.clone());
        Ok(closure)
    }

    fn visit(
        &mut self,
        node: &Path,
        stack: &mut Vec<PathBuf>,
        out: &mut IndexSet<PathBuf>,
    ) -> Result<(), CycleError> {
        let children = self.direct_imports(node).to_vec();
        for child in children {
            if let Some(start) = stack.iter().position(|p| p == &child) {
                return Err(CycleError {
                    cycle: stack[start..].to_vec(),
                });
            }
            if !out.insert(child.clone()) {
                continue;
            }
            // A memoized closure implies no cycle is reachable from the
            // child, so the stack check can be skipped for its members.
            if let Some(cached) = self.closures.get(&child) {
                for dep in cached.clone() {
                    out.insert(dep);
                }
                continue;
            }
            stack.push(child.clone());
            self.visit(&child, stack, out)?;
            stack.pop();
        }
        Ok(())
    }
}
