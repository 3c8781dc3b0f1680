//! Grammar adapter: pooled parsing plus dispatch-table conversion.

use std::path::Path;
use std::sync::Arc;

use graft_core::{GraftError, Language, ParsedContent, Result, SemanticNode};
use tree_sitter::{Node, Tree};

use crate::extractor::{convert_node, extract};
use crate::languages::{GrammarRegistry, ModuleConventions};
use crate::parser_pool::ParserPool;

/// Parses files and converts raw trees into semantic trees.
///
/// Cheap to clone; the registry and the parser pool are shared.
#[derive(Debug, Clone, Default)]
pub struct GrammarAdapter {
    registry: Arc<GrammarRegistry>,
    pool: ParserPool,
}

impl GrammarAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    pub fn supports(&self, language: Language) -> bool {
        self.registry.supports(language)
    }

    pub fn conventions(&self, language: Language) -> Option<&dyn ModuleConventions> {
        self.registry.conventions(language)
    }

    /// Parse `text` and build its semantic tree.
    ///
    /// With an `old_tree` that has had the edits applied, tree-sitter reuses
    /// unchanged subtrees. Syntax errors are reported in the result, not as `Err`.
    pub fn parse(&self, path: &Path, language: Language, text: String, old_tree: Option<&Tree>) -> Result<ParsedContent> {
        let grammar = self
            .registry
            .get(language)
            .ok_or_else(|| GraftError::UnsupportedLanguage(path.to_path_buf()))?;
        let tree = self
            .pool
            .parse(path, language, &grammar.ts_language, text.as_bytes(), old_tree)?;
        let extraction = extract(&tree, text.as_bytes(), &grammar.table);
        if !extraction.syntax_errors.is_empty() {
            tracing::debug!(
                "{} has {} syntax error(s)",
                path.display(),
                extraction.syntax_errors.len()
            );
        }
        Ok(ParsedContent {
            text,
            tree: Some(tree),
            root: extraction.root,
            syntax_errors: extraction.syntax_errors,
        })
    }

    /// Semantic node for one raw node. Unrecognised types become `Unknown`.
    pub fn convert(&self, language: Language, raw: Node<'_>, source: &[u8]) -> SemanticNode {
        match self.registry.get(language) {
            Some(grammar) => convert_node(raw, source, &grammar.table),
            None => SemanticNode::unknown(crate::languages::helpers::span(raw)),
        }
    }
}
