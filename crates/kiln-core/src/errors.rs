use std::path::PathBuf;
use thiserror::Error;

/// An import reference could not be matched to any file in the file set.
/// Recoverable per unit; reported as a diagnostic for every entry whose
/// import closure reaches the importer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to resolve import \"{reference}\" from {}", .importer.display())]
pub struct ResolutionError {
    pub reference: String,
    pub importer: PathBuf,
}

/// A circular import was detected while computing an entry's transitive
/// closure. Recoverable per unit; unrelated entries still compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("import cycle detected: {}", format_cycle(.cycle))]
pub struct CycleError {
    /// The members of the cycle, in import order.
    pub cycle: Vec<PathBuf>,
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    let mut names: Vec<String> = cycle.iter().map(|p| p.display().to_string()).collect();
    if let Some(first) = names.first().cloned() {
        names.push(first);
    }
    names.join(" -> ")
}

/// The underlying compiler rejected the source. The message and position
/// are carried verbatim into the unit's diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompilerError {
    pub message: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompilerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
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
}

/// Project configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError {
            reference: "colors".to_string(),
            importer: PathBuf::from("/app/main.scss"),
        };
        assert_eq!(
            err.to_string(),
            "unable to resolve import \"colors\" from /app/main.scss"
        );
    }

    #[test]
    fn test_cycle_error_display() {
        let err = CycleError {
            cycle: vec![PathBuf::from("/a.scss"), PathBuf::from("/b.scss")],
        };
        assert_eq!(
            err.to_string(),
            "import cycle detected: /a.scss -> /b.scss -> /a.scss"
        );
    }

    #[test]
    fn test_compiler_error_builders() {
        let err = CompilerError::new("expected \";\"")
            .with_file("/app/main.scss")
            .with_position(3, 7);
        assert_eq!(err.to_string(), "expected \";\"");
        assert_eq!(err.line, Some(3));
        assert_eq!(err.column, Some(7));
    }
}
