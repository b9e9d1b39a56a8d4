use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::{CompilerError, CycleError, ResolutionError};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A per-unit diagnostic handed back to the host: message plus source
/// location when one is available. Serializable so that failed compile
/// results can live in the persisted cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<ResolutionError> for Diagnostic {
    fn from(err: ResolutionError) -> Self {
        let message = err.to_string();
        Diagnostic::error(message).with_file(err.importer)
    }
}

impl From<CycleError> for Diagnostic {
    fn from(err: CycleError) -> Self {
        let message = err.to_string();
        let mut diagnostic = Diagnostic::error(message);
        if let Some(first) = err.cycle.first() {
            diagnostic = diagnostic.with_file(first.clone());
        }
        diagnostic
    }
}

impl From<CompilerError> for Diagnostic {
    fn from(err: CompilerError) -> Self {
        Self {
            severity: Severity::Error,
            message: err.message,
            file: err.file,
            line: err.line,
            column: err.column,
        }
    }
}
