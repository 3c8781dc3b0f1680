//! Per-language dispatch tables and module-path conventions.
//!
//! Each language module exposes a `grammar()` constructor returning a
//! [`LanguageGrammar`]: the tree-sitter language, a table mapping raw node type
//! strings to constructors, and the language's [`ModuleConventions`]. Tables are
//! pure data and are built once into a [`GrammarRegistry`]. Adding a language
//! means adding one module here; graph and resolver code does not change.

pub mod go;
pub mod helpers;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use graft_core::{Language, SemanticNode};
use tree_sitter::Node;

/// What the walker should visit after a constructor has built a node.
#[derive(Debug, Clone, Copy)]
pub enum Visit<'t> {
    /// Look this raw node up in the table itself.
    Node(Node<'t>),
    /// Walk each child of this raw node.
    ChildrenOf(Node<'t>),
}

/// A constructed semantic node plus the raw subtrees that hold its children.
#[derive(Debug)]
pub struct Built<'t> {
    pub node: SemanticNode,
    pub visit: Vec<Visit<'t>>,
}

impl<'t> Built<'t> {
    /// Node whose semantic children come from the raw node's own children.
    pub fn descending(node: SemanticNode, raw: Node<'t>) -> Self {
        Built {
            node,
            visit: vec![Visit::ChildrenOf(raw)],
        }
    }

    pub fn leaf(node: SemanticNode) -> Self {
        Built { node, visit: Vec::new() }
    }
}

/// Builds a semantic node from a raw node, or declines with `None` so the
/// walker descends through it instead.
pub type Constructor = for<'t> fn(Node<'t>, &[u8]) -> Option<Built<'t>>;

/// Decides whether a raw sibling directly above a definition belongs to it
/// (attributes, doc comments).
pub type LeadingFragment = fn(Node<'_>, &[u8]) -> bool;

/// `type-string -> constructor` for one language.
#[derive(Clone, Default)]
pub struct DispatchTable {
    entries: HashMap<&'static str, Constructor>,
    leading: Option<LeadingFragment>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, kind: &'static str, constructor: Constructor) -> Self {
        self.entries.insert(kind, constructor);
        self
    }

    pub fn with_leading(mut self, check: LeadingFragment) -> Self {
        self.leading = Some(check);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Constructor> {
        self.entries.get(kind).copied()
    }

    pub fn leading(&self) -> Option<LeadingFragment> {
        self.leading
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&&str> = self.entries.keys().collect();
        kinds.sort();
        f.debug_struct("DispatchTable").field("kinds", &kinds).finish()
    }
}

/// How a language maps module specifiers to files.
///
/// All paths are relative to the project root.
pub trait ModuleConventions: Send + Sync {
    /// Candidate files (or package directories) a specifier may name, most likely first.
    fn module_candidates(&self, importer: &Path, module: &str) -> Vec<PathBuf>;

    /// Specifiers resolved against the importing file rather than search roots.
    fn is_relative(&self, module: &str) -> bool;

    /// Whether a specifier that did not bind should be classed as third-party.
    fn looks_external(&self, module: &str) -> bool {
        !self.is_relative(module)
    }

    /// Separator between qualified-name segments in this language's module paths.
    fn separator(&self) -> &'static str;

    /// Specifier of `name` treated as a submodule of `module` (`from . import b`).
    fn submodule(&self, _module: &str, _name: &str) -> Option<String> {
        None
    }

    /// Identifier a whole-module import binds when it has no alias.
    fn default_binding(&self, module: &str) -> Option<String>;

    /// Source line importing `name` from `target` into `importer`.
    fn render_import(&self, importer: &Path, target: &Path, name: &str) -> Option<String>;
}

/// Everything the adapter and resolver need to know about one language.
pub struct LanguageGrammar {
    pub language: Language,
    pub ts_language: tree_sitter::Language,
    pub table: DispatchTable,
    pub conventions: Box<dyn ModuleConventions>,
}

impl std::fmt::Debug for LanguageGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageGrammar")
            .field("language", &self.language)
            .field("table", &self.table)
            .finish()
    }
}

/// All grammars, built once at startup.
#[derive(Debug)]
pub struct GrammarRegistry {
    grammars: HashMap<Language, LanguageGrammar>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        let mut grammars = HashMap::new();
        for grammar in [
            python::grammar(),
            typescript::grammar(),
            typescript::tsx_grammar(),
            javascript::grammar(),
            rust::grammar(),
            go::grammar(),
            java::grammar(),
        ] {
            grammars.insert(grammar.language, grammar);
        }
        GrammarRegistry { grammars }
    }

    pub fn get(&self, language: Language) -> Option<&LanguageGrammar> {
        self.grammars.get(&language)
    }

    pub fn conventions(&self, language: Language) -> Option<&dyn ModuleConventions> {
        self.grammars.get(&language).map(|g| g.conventions.as_ref())
    }

    pub fn supports(&self, language: Language) -> bool {
        self.grammars.contains_key(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.grammars.keys().copied()
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}
