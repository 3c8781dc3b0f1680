//! Thread-safe parser pool for tree-sitter parsers
//!
//! Tree-sitter parsers are `Send` but not `Sync`, and configuring one for a
//! language is not free. The pool keeps idle parsers per language behind a
//! mutex; a caller checks one out for the duration of a single parse and hands
//! it back afterwards, so rayon workers and the commit path can parse
//! concurrently without sharing a parser.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use graft_core::{GraftError, Language, Result};
use tree_sitter::{Parser, Tree};

/// Idle parsers kept per language. Extra parsers are dropped on check-in.
const MAX_IDLE_PER_LANGUAGE: usize = 32;

#[derive(Clone, Default)]
pub struct ParserPool {
    idle: Arc<Mutex<HashMap<Language, Vec<Parser>>>>,
}

impl ParserPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, reusing `old_tree` for an incremental parse when given.
    /// The old tree must already have had the matching `InputEdit`s applied.
    pub fn parse(
        &self,
        path: &Path,
        language: Language,
        ts_language: &tree_sitter::Language,
        source: &[u8],
        old_tree: Option<&Tree>,
    ) -> Result<Tree> {
        let mut parser = self.checkout(path, language, ts_language)?;
        let tree = parser.parse(source, old_tree);
        self.checkin(language, parser);
        tree.ok_or_else(|| GraftError::Parse {
            path: path.to_path_buf(),
            message: "parser returned no tree".to_string(),
        })
    }

    fn checkout(&self, path: &Path, language: Language, ts_language: &tree_sitter::Language) -> Result<Parser> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&language)
            .and_then(Vec::pop);
        if let Some(mut parser) = reused {
            parser.reset();
            return Ok(parser);
        }
        tracing::debug!("Creating {} parser", language.name());
        let mut parser = Parser::new();
        parser.set_language(ts_language).map_err(|e| GraftError::Parse {
            path: path.to_path_buf(),
            message: format!("Failed to set language: {e}"),
        })?;
        Ok(parser)
    }

    fn checkin(&self, language: Language, parser: Parser) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        let parsers = idle.entry(language).or_default();
        if parsers.len() < MAX_IDLE_PER_LANGUAGE {
            parsers.push(parser);
        }
    }

    /// Number of idle parsers for `language`.
    pub fn idle_count(&self, language: Language) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&language)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for ParserPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&'static str, usize> = idle.iter().map(|(l, p)| (l.name(), p.len())).collect();
        f.debug_struct("ParserPool").field("idle", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rust() {
        let pool = ParserPool::new();
        let content = "fn main() {\n    println!(\"Hello, world!\");\n}\n";
        let tree = pool
            .parse(
                Path::new("test.rs"),
                Language::Rust,
                &tree_sitter_rust::LANGUAGE.into(),
                content.as_bytes(),
                None,
            )
            .unwrap();
        assert_eq!(tree.root_node().kind(), "source_file");
        assert_eq!(pool.idle_count(Language::Rust), 1);
    }

    #[test]
    fn test_parsers_are_reused_across_threads() {
        let pool = ParserPool::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let ts: tree_sitter::Language = tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into();
                    let tree = pool
                        .parse(Path::new("a.ts"), Language::TypeScript, &ts, b"class A { m() {} }", None)
                        .unwrap();
                    assert_eq!(tree.root_node().kind(), "program");
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let idle = pool.idle_count(Language::TypeScript);
        assert!((1..=4).contains(&idle));
    }
}
