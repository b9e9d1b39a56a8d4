//! Incremental batch compilation for stylesheet projects.
//!
//! The host build system supplies the current file set; kiln resolves
//! imports, builds the dependency graph, keys every entry by the content
//! of its transitive closure, compiles only the entries whose key is new,
//! and hands back one artifact or diagnostic per entry. The underlying
//! stylesheet compiler is a black box behind [`compiler::StylesheetCompiler`].

pub mod cache;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod errors;
pub mod graph;
pub mod imports;
pub mod resolver;
pub mod source;

pub use cache::{CacheEntry, CacheKey, CompileCache, DiskCache};
pub use compiler::{CompileRequest, CompiledStyle, InlineCompiler, StylesheetCompiler};
pub use config::{BuildConfig, BuildOptions, OutputStyle};
pub use diagnostics::{Diagnostic, Severity};
pub use driver::{BatchContext, BatchOutcome, UnitOutput, UnitResult};
pub use emit::HostArtifact;
pub use errors::{CompilerError, ConfigError, CycleError, ResolutionError};
pub use graph::DependencyGraph;
pub use source::{BuildTarget, FileSet, SourceFile};
