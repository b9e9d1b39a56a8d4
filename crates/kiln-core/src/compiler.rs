//! The underlying stylesheet compiler, behind a trait.
//!
//! The batch driver treats compilation as a black box: source in, compiled
//! text or an error out. Backends are injected per batch, so tests can
//! script outcomes and hosts can plug in a real Sass engine.

use serde_json::json;

use crate::config::{BuildOptions, OutputStyle};
use crate::errors::CompilerError;
use crate::source::SourceFile;

/// Everything a backend sees for one compilation unit: the entry, its
/// transitive dependencies in import order, and the active options.
pub struct CompileRequest<'a> {
    pub entry: &'a SourceFile,
    pub dependencies: Vec<&'a SourceFile>,
    pub options: &'a BuildOptions,
}

/// A successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    pub css: String,
    pub source_map: Option<String>,
}

/// Black-box compiler contract. A single call is blocking and CPU-bound;
/// the driver dispatches calls from a worker pool, so implementations must
/// be shareable across threads.
pub trait StylesheetCompiler: Sync {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledStyle, CompilerError>;
}

/// Reference backend: splices each unit's dependencies ahead of its own
/// content, with import statements dropped. It performs no selector or
/// expression evaluation, but it honors the output style and source-map
/// options and rejects sources with unbalanced braces, which is enough to
/// exercise the full pipeline.
#[derive(Debug, Default)]
pub struct InlineCompiler;

impl InlineCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl StylesheetCompiler for InlineCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledStyle, CompilerError> {
        let mut pieces = Vec::with_capacity(request.dependencies.len() + 1);
        for dep in &request.dependencies {
            check_braces(dep)?;
            pieces.push(strip_imports(&dep.content));
        }
        check_braces(request.entry)?;
        pieces.push(strip_imports(&request.entry.content));

        let spliced: Vec<&str> = pieces
            .iter()
            .map(String::as_str)
            .filter(|piece| !piece.trim().is_empty())
            .collect();

        let css = match request.options.output_style {
            OutputStyle::Expanded => {
                let mut css = spliced.join("\n");
                if !css.is_empty() {
                    css.push('\n');
                }
                css
            }
            OutputStyle::Compact => compact(&spliced.join("\n")),
        };

        let source_map = request.options.source_maps.then(|| {
            let sources: Vec<String> = request
                .dependencies
                .iter()
                .map(|dep| dep.path.display().to_string())
                .chain(std::iter::once(request.entry.path.display().to_string()))
                .collect();
            json!({
                "version": 3,
                "file": request.entry.path.display().to_string(),
                "sources": sources,
                "mappings": "",
            })
            .to_string()
        });

        Ok(CompiledStyle { css, source_map })
    }
}

/// Drop `@import`/`@use`/`@forward` statements; the driver has already
/// resolved them into the dependency list.
fn strip_imports(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with("@import")
                || trimmed.starts_with("@use")
                || trimmed.starts_with("@forward"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One rule per line, runs of whitespace collapsed.
fn compact(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut last_space = true;
    for ch in css.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
            if ch == '}' {
                out.push('\n');
                last_space = true;
            }
        }
    }
    let trimmed = out.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

fn check_braces(file: &SourceFile) -> Result<(), CompilerError> {
    let mut depth: i64 = 0;
    for (index, line) in file.content.lines().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(CompilerError::new("unmatched \"}\"")
                            .with_file(&file.path)
                            .with_position(index as u32 + 1, 1));
                    }
                }
                _ => {}
            }
        }
    }
    if depth > 0 {
        return Err(CompilerError::new("unclosed block").with_file(&file.path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BuildTarget;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content, BuildTarget::Neutral, true)
    }

    fn compile(
        entry: &SourceFile,
        dependencies: Vec<&SourceFile>,
        options: &BuildOptions,
    ) -> Result<CompiledStyle, CompilerError> {
        InlineCompiler::new().compile(&CompileRequest {
            entry,
            dependencies,
            options,
        })
    }

    #[test]
    fn test_dependencies_spliced_before_entry() {
        let dep = file("/app/_a.scss", ".a { color: red; }");
        let entry = file("/app/main.scss", "@import \"a\";\n.main { margin: 0; }");

        let out = compile(&entry, vec![&dep], &BuildOptions::default()).unwrap();
        assert_eq!(out.css, ".a { color: red; }\n.main { margin: 0; }\n");
    }

    #[test]
    fn test_compact_style() {
        let entry = file("/app/main.scss", ".a {\n  color: red;\n}\n.b {\n  margin: 0;\n}");
        let options = BuildOptions {
            output_style: OutputStyle::Compact,
            ..BuildOptions::default()
        };

        let out = compile(&entry, vec![], &options).unwrap();
        assert_eq!(out.css, ".a { color: red; }\n.b { margin: 0; }\n");
    }

    #[test]
    fn test_source_map_lists_sources_in_splice_order() {
        let dep = file("/app/_a.scss", ".a {}");
        let entry = file("/app/main.scss", "@use \"a\";");
        let options = BuildOptions {
            source_maps: true,
            ..BuildOptions::default()
        };

        let out = compile(&entry, vec![&dep], &options).unwrap();
        let map: serde_json::Value = serde_json::from_str(out.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sources"][0], "/app/_a.scss");
        assert_eq!(map["sources"][1], "/app/main.scss");
    }

    #[test]
    fn test_no_source_map_by_default() {
        let entry = file("/app/main.scss", ".a {}");
        let out = compile(&entry, vec![], &BuildOptions::default()).unwrap();
        assert!(out.source_map.is_none());
    }

    #[test]
    fn test_unclosed_block_is_a_compiler_error() {
        let entry = file("/app/broken.scss", ".a { color: red;");
        let err = compile(&entry, vec![], &BuildOptions::default()).unwrap_err();
        assert_eq!(err.message, "unclosed block");
        assert_eq!(err.file, Some(entry.path.clone()));
    }

    #[test]
    fn test_unmatched_close_reports_position() {
        let entry = file("/app/broken.scss", ".a { }\n}\n");
        let err = compile(&entry, vec![], &BuildOptions::default()).unwrap_err();
        assert_eq!(err.message, "unmatched \"}\"");
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_broken_dependency_fails_the_unit() {
        let dep = file("/app/_a.scss", ".a {");
        let entry = file("/app/main.scss", "@import \"a\";");
        let err = compile(&entry, vec![&dep], &BuildOptions::default()).unwrap_err();
        assert_eq!(err.file, Some(dep.path.clone()));
    }
}
