//! Packaging of batch results for the host build system.

use std::path::PathBuf;

use crate::diagnostics::Diagnostic;
use crate::driver::{BatchOutcome, UnitResult};

/// What the host receives for one entry: a compiled stylesheet with the
/// paths to register as watch targets, or a diagnostic and no stylesheet.
/// Partials never appear here; they are never entries.
#[derive(Debug, Clone, PartialEq)]
pub enum HostArtifact {
    Stylesheet {
        path: PathBuf,
        css: String,
        source_map: Option<String>,
        /// Transitive dependency paths, in import order; the host watches
        /// these to know when the entry needs recompiling
        watched_paths: Vec<PathBuf>,
    },
    Failure {
        path: PathBuf,
        diagnostic: Diagnostic,
    },
}

impl HostArtifact {
    pub fn path(&self) -> &PathBuf {
        match self {
            HostArtifact::Stylesheet { path, .. } => path,
            HostArtifact::Failure { path, .. } => path,
        }
    }
}

pub fn package(result: &UnitResult) -> HostArtifact {
    match &result.outcome {
        Ok(output) => HostArtifact::Stylesheet {
            path: result.path.clone(),
            css: output.css.clone(),
            source_map: output.source_map.clone(),
            watched_paths: output.dependencies.clone(),
        },
        Err(diagnostic) => HostArtifact::Failure {
            path: result.path.clone(),
            diagnostic: diagnostic.clone(),
        },
    }
}

impl BatchOutcome {
    /// Package every unit result, preserving entry order.
    pub fn artifacts(&self) -> Vec<HostArtifact> {
        self.results.iter().map(package).collect()
    }
}
