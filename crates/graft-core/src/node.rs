//! Semantic nodes: what the grammar adapter builds and what the graph stores.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tree_sitter::Tree;

use crate::model::{ExtendedSpan, FileId, Language, NodeId, NodeKind, Span};

/// A name as it appears in source, with the span of its identifier token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
    /// Leading qualifier for dotted names (`models` in `models.Model`).
    pub qualifier: Option<String>,
    pub span: Span,
}

/// One name brought in by an import statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
    /// Span of the `name` token, not the alias.
    pub span: Span,
}

impl ImportedName {
    /// The identifier this import introduces into the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SymbolData {
    /// Filled in by the graph when the node is installed.
    pub qualified_name: String,
    pub superclasses: Vec<NameRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImportData {
    /// Module specifier exactly as written (`./util`, `..pkg.mod`, `crate::a::b`).
    pub module: String,
    pub module_span: Span,
    /// Names imported from the module; empty for whole-module imports.
    pub names: Vec<ImportedName>,
    /// Binding for a whole-module import (`import x as y`, `import * as ns`).
    pub alias: Option<String>,
    pub wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub name: String,
    pub qualifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodePayload {
    #[default]
    None,
    Symbol(SymbolData),
    Import(ImportData),
    Reference(ReferenceData),
}

/// Language-agnostic node produced by a dispatch-table constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticNode {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub name_span: Option<Span>,
    pub span: Span,
    pub extended: ExtendedSpan,
    pub payload: NodePayload,
    pub children: Vec<SemanticNode>,
}

impl SemanticNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        SemanticNode {
            kind,
            name: None,
            name_span: None,
            span,
            extended: ExtendedSpan::single(span),
            payload: NodePayload::None,
            children: Vec::new(),
        }
    }

    /// Fallback for constructs no table recognises.
    pub fn unknown(span: Span) -> Self {
        Self::new(NodeKind::Unknown, span)
    }

    pub fn with_name(mut self, name: impl Into<String>, span: Span) -> Self {
        self.name = Some(name.into());
        self.name_span = Some(span);
        self
    }

    pub fn with_payload(mut self, payload: NodePayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn extended_span(&self) -> &ExtendedSpan {
        &self.extended
    }

    /// Direct children. Each call starts a fresh iterator.
    pub fn children(&self) -> std::slice::Iter<'_, SemanticNode> {
        self.children.iter()
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(SemanticNode::subtree_len).sum::<usize>()
    }
}

/// A node as stored in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub name_span: Option<Span>,
    pub span: Span,
    pub extended: ExtendedSpan,
    pub payload: NodePayload,
}

impl NodeRecord {
    pub fn file(&self) -> FileId {
        self.id.file
    }

    pub fn qualified_name(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Symbol(data) => Some(&data.qualified_name),
            _ => None,
        }
    }

    pub fn import(&self) -> Option<&ImportData> {
        match &self.payload {
            NodePayload::Import(data) => Some(data),
            _ => None,
        }
    }

    pub fn reference(&self) -> Option<&ReferenceData> {
        match &self.payload {
            NodePayload::Reference(data) => Some(data),
            _ => None,
        }
    }

    pub fn superclasses(&self) -> &[NameRef] {
        match &self.payload {
            NodePayload::Symbol(data) => &data.superclasses,
            _ => &[],
        }
    }
}

/// Anything with a position in a file's text that edits can target.
pub trait Editable {
    fn node_id(&self) -> NodeId;
    fn kind(&self) -> NodeKind;
    fn span(&self) -> Span;
    fn extended_span(&self) -> &ExtendedSpan;
}

impl Editable for NodeRecord {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn span(&self) -> Span {
        self.span
    }

    fn extended_span(&self) -> &ExtendedSpan {
        &self.extended
    }
}

/// A source file known to the graph.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: FileId,
    /// Path relative to the project root.
    pub path: PathBuf,
    pub language: Language,
    pub text: String,
    pub tree: Option<Tree>,
    /// Bumped on every change to the text, including rollbacks.
    pub revision: u64,
    /// Next local node id to hand out. Never decreases.
    pub next_local: u32,
    /// Owned nodes in pre-order; the root is first.
    pub nodes: Vec<NodeId>,
    pub syntax_errors: Vec<Span>,
}

impl FileRecord {
    pub fn root(&self) -> NodeId {
        NodeId::root(self.id)
    }

    pub fn has_syntax_errors(&self) -> bool {
        !self.syntax_errors.is_empty()
    }

    /// Module-ish display path with forward slashes, used in qualified names.
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }
}

pub fn display_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
