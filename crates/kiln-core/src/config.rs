use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Output formatting of compiled stylesheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStyle {
    #[serde(rename = "expanded")]
    Expanded,
    #[serde(rename = "compact")]
    Compact,
}

impl Default for OutputStyle {
    fn default() -> Self {
        OutputStyle::Expanded
    }
}

impl std::str::FromStr for OutputStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expanded" => Ok(OutputStyle::Expanded),
            "compact" => Ok(OutputStyle::Compact),
            other => Err(format!(
                "invalid output style '{other}'; supported styles: expanded, compact"
            )),
        }
    }
}

/// Compile options that feed every cache key. Any change here invalidates
/// cached results for all entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    /// Directories searched, after the importer's own directory, when
    /// resolving an import reference (in order)
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,

    /// Output formatting (default: expanded)
    #[serde(default)]
    pub output_style: OutputStyle,

    /// Generate source maps (default: false)
    #[serde(default)]
    pub source_maps: bool,
}

/// Project configuration, loaded from `kiln.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Compile options
    #[serde(default)]
    pub options: BuildOptions,

    /// Files to include (glob patterns)
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Files to exclude (glob patterns)
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*.scss".to_string(), "**/*.sass".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.kiln-cache/**".to_string(),
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            options: BuildOptions::default(),
            include: default_include(),
            exclude: default_exclude(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<(), ConfigError> {
        let config = BuildConfig::default();
        let json = serde_json::to_string_pretty(&config)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
