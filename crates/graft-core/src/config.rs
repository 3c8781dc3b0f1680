//! Project configuration.
//!
//! Loads a TOML config from `graft.toml` at the project root; every field has a default.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GraftError, Result};

pub const CONFIG_FILE: &str = "graft.toml";

/// Top-level graft configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraftConfig {
    pub resolution: ResolutionConfig,
    pub edits: EditConfig,
    pub index: IndexConfig,
    /// Glob -> owners. Absent means ownership queries return nothing.
    pub owners: Option<BTreeMap<String, Vec<String>>>,
}

impl GraftConfig {
    /// Load configuration from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GraftError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: GraftConfig = toml::from_str(content).map_err(|e| GraftError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Save configuration to the given path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| GraftError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| GraftError::io(path, e))
    }

    /// Load `graft.toml` from the project root, or return defaults if it doesn't exist.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn check(&self) -> Result<()> {
        let rate = self.resolution.min_resolution_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(GraftError::Config(format!("min_resolution_rate must be within 0..=1, got {rate}")));
        }
        self.resolution.external_matchers()?;
        self.index.filter()?;
        Ok(())
    }

    /// Owners of a path under the optional owners map. Empty when no map is configured.
    pub fn owners_of(&self, path: &Path) -> Vec<String> {
        let Some(map) = &self.owners else {
            return Vec::new();
        };
        let mut owners: Vec<String> = Vec::new();
        for (pattern, names) in map {
            let Ok(glob) = Glob::new(pattern) else {
                tracing::warn!("Ignoring invalid owners glob '{}'", pattern);
                continue;
            };
            if glob.compile_matcher().is_match(path) {
                for name in names {
                    if !owners.contains(name) {
                        owners.push(name.clone());
                    }
                }
            }
        }
        owners
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum fraction of imports that must bind before validation fails.
    pub min_resolution_rate: f64,
    /// Whether imports classified as external count as bound.
    pub count_external_as_resolved: bool,
    /// Extra roots, relative to the project root, tried for non-relative modules.
    pub module_search_paths: Vec<PathBuf>,
    /// Module specifiers matching any of these regexes are external.
    pub external_patterns: Vec<String>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            min_resolution_rate: 0.2,
            count_external_as_resolved: true,
            module_search_paths: Vec::new(),
            external_patterns: Vec::new(),
        }
    }
}

impl ResolutionConfig {
    pub fn external_matchers(&self) -> Result<Vec<Regex>> {
        self.external_patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| GraftError::Config(format!("external pattern '{p}': {e}"))))
            .collect()
    }
}

/// How much surrounding whitespace a node deletion takes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WhitespaceRule {
    /// Delete exactly the node's extended span.
    Exact,
    /// Also delete the rest of the line when the node occupies whole lines.
    #[default]
    Line,
    /// Like `Line`, plus blank lines that directly follow.
    BlankLines,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditConfig {
    pub whitespace: WhitespaceRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Globs a path must match to be indexed. Empty means everything.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Larger files are skipped.
    pub max_file_bytes: u64,
    /// Parser threads for the initial scan; 0 uses rayon's default.
    pub threads: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: vec![
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
            max_file_bytes: 2 * 1024 * 1024,
            threads: 0,
        }
    }
}

impl IndexConfig {
    pub fn filter(&self) -> Result<PathFilter> {
        Ok(PathFilter {
            include: build_globset(&self.include)?,
            exclude: build_globset(&self.exclude)?,
        })
    }
}

/// Compiled include/exclude globs.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathFilter {
    /// Check a path relative to the project root.
    pub fn accepts(&self, relative: &Path) -> bool {
        if self.exclude.as_ref().is_some_and(|set| set.is_match(relative)) {
            return false;
        }
        self.include.as_ref().is_none_or(|set| set.is_match(relative))
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| GraftError::Config(format!("glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| GraftError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = GraftConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = GraftConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config = GraftConfig::parse(
            r#"
[resolution]
min_resolution_rate = 0.5

[edits]
whitespace = "exact"
"#,
        )
        .unwrap();
        assert_eq!(config.resolution.min_resolution_rate, 0.5);
        assert!(config.resolution.count_external_as_resolved);
        assert_eq!(config.edits.whitespace, WhitespaceRule::Exact);
        assert!(config.owners.is_none());
    }

    #[test]
    fn rejects_out_of_range_rate() {
        let err = GraftConfig::parse("[resolution]\nmin_resolution_rate = 3.0\n").unwrap_err();
        assert!(matches!(err, GraftError::Config(_)));
    }

    #[test]
    fn owners_absent_yields_empty() {
        let config = GraftConfig::default();
        assert!(config.owners_of(Path::new("src/a.py")).is_empty());
    }

    #[test]
    fn owners_match_globs() {
        let config = GraftConfig::parse(
            r#"
[owners]
"src/**" = ["core-team"]
"**/*.py" = ["python", "core-team"]
"#,
        )
        .unwrap();
        assert_eq!(
            config.owners_of(Path::new("src/a.py")),
            vec!["python".to_string(), "core-team".to_string()]
        );
    }

    #[test]
    fn default_filter_excludes_vendor_dirs() {
        let filter = IndexConfig::default().filter().unwrap();
        assert!(filter.accepts(Path::new("src/main.rs")));
        assert!(!filter.accepts(Path::new("web/node_modules/x/index.js")));
    }
}
