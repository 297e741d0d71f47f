use crate::error::{IndexerError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Project-local override picked up by `analyze_project`
pub const PROJECT_CONFIG_FILE: &str = "context-engine.toml";

pub const PARSE_CONCURRENCY_ENV: &str = "CONTEXT_ENGINE_PARSE_CONCURRENCY";

pub const MAX_PARSE_CONCURRENCY: usize = 32;

/// Files or directories whose presence marks a project root
pub const DEFAULT_PROJECT_MARKERS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "go.mod",
    ".git",
    ".hg",
    ".svn",
];

/// Engine settings. Every field has a default, so a TOML file only needs the
/// keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Soft latency budget for one `apply_changes` batch
    pub update_budget_ms: u64,
    pub max_results: usize,
    pub snippet_chars: usize,
    pub max_file_size_bytes: u64,
    pub parse_concurrency: usize,
    pub include_hidden: bool,
    /// Globs matched against root-relative paths
    pub exclude_globs: Vec<String>,
    pub project_markers: Vec<String>,
    pub watch_debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_budget_ms: 500,
            max_results: context_search::DEFAULT_MAX_RESULTS,
            snippet_chars: context_search::DEFAULT_SNIPPET_CHARS,
            max_file_size_bytes: 1_048_576,
            parse_concurrency: parse_concurrency_from_env(),
            include_hidden: false,
            exclude_globs: Vec::new(),
            project_markers: DEFAULT_PROJECT_MARKERS
                .iter()
                .map(|marker| (*marker).to_string())
                .collect(),
            watch_debounce_ms: 250,
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(IndexerError::InvalidConfig(
                "max_results must be at least 1".to_string(),
            ));
        }
        if self.snippet_chars == 0 {
            return Err(IndexerError::InvalidConfig(
                "snippet_chars must be at least 1".to_string(),
            ));
        }
        if self.max_file_size_bytes == 0 {
            return Err(IndexerError::InvalidConfig(
                "max_file_size_bytes must be positive".to_string(),
            ));
        }
        if !(1..=MAX_PARSE_CONCURRENCY).contains(&self.parse_concurrency) {
            return Err(IndexerError::InvalidConfig(format!(
                "parse_concurrency must be within 1..={MAX_PARSE_CONCURRENCY}, got {}",
                self.parse_concurrency
            )));
        }
        if self.project_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(IndexerError::InvalidConfig(
                "project_markers must name at least one marker".to_string(),
            ));
        }
        self.exclude_set()?;
        Ok(())
    }

    /// Compile `exclude_globs`
    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_globs {
            let glob = Glob::new(pattern).map_err(|err| {
                IndexerError::InvalidConfig(format!("invalid exclude glob {pattern:?}: {err}"))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|err| IndexerError::InvalidConfig(format!("invalid exclude globs: {err}")))
    }

    pub fn update_budget(&self) -> Duration {
        Duration::from_millis(self.update_budget_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

fn default_parse_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_PARSE_CONCURRENCY)
}

fn parse_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_PARSE_CONCURRENCY)
}

fn parse_concurrency_from_env() -> usize {
    let raw = std::env::var(PARSE_CONCURRENCY_ENV).ok();
    parse_concurrency(raw.as_deref(), default_parse_concurrency())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_concurrency_defaults_and_clamps() {
        let default_value = default_parse_concurrency();
        assert_eq!(parse_concurrency(None, default_value), default_value);
        assert_eq!(parse_concurrency(Some("   "), default_value), default_value);
        assert_eq!(parse_concurrency(Some("4"), default_value), 4);
        assert_eq!(parse_concurrency(Some("0"), default_value), 1);
        assert_eq!(
            parse_concurrency(Some("999"), default_value),
            MAX_PARSE_CONCURRENCY
        );
        assert_eq!(parse_concurrency(Some("many"), default_value), default_value);
        assert_eq!(parse_concurrency(Some(" 7 "), default_value), 7);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            "max_results = 5\nexclude_globs = [\"generated/**\"]\n",
        )
        .unwrap();
        assert_eq!(config.max_results, 5);
        assert_eq!(config.update_budget_ms, 500);
        assert_eq!(config.snippet_chars, 200);
        assert_eq!(config.watch_debounce(), Duration::from_millis(250));
        assert!(config.exclude_set().unwrap().is_match("generated/api.rs"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_results = 0"),
            Err(IndexerError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("parse_concurrency = 64"),
            Err(IndexerError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("exclude_globs = [\"a[\"]"),
            Err(IndexerError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("no_such_key = true"),
            Err(IndexerError::ConfigParse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(&path, "update_budget_ms = 50\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.update_budget(), Duration::from_millis(50));
    }
}
