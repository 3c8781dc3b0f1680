//! Source file discovery under a project root.

use std::path::{Path, PathBuf};

use graft_core::{FileSystem, IndexConfig, Language, Result};

use crate::languages::GrammarRegistry;

/// A file the scan will parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative to the project root.
    pub path: PathBuf,
    pub language: Language,
}

/// Supported source files under `root` that pass the index filters, sorted by path.
pub fn discover(
    fs: &dyn FileSystem,
    root: &Path,
    config: &IndexConfig,
    registry: &GrammarRegistry,
) -> Result<Vec<SourceFile>> {
    let filter = config.filter()?;
    let mut out = Vec::new();
    for absolute in fs.list(root)? {
        let Ok(relative) = absolute.strip_prefix(root) else {
            continue;
        };
        let language = Language::from_path(relative);
        if !registry.supports(language) || !filter.accepts(relative) {
            continue;
        }
        out.push(SourceFile {
            path: relative.to_path_buf(),
            language,
        });
    }
    tracing::debug!("Discovered {} source files under {}", out.len(), root.display());
    Ok(out)
}
