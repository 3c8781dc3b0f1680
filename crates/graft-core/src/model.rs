//! Core data structures for the code graph

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Identifier of a file within one codebase. Never reused, even after the file is unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Unique, stable identifier for a node: the owning file plus a per-file counter.
///
/// Local id `0` is always the file's root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub file: FileId,
    pub local: u32,
}

impl NodeId {
    pub fn new(file: FileId, local: u32) -> Self {
        NodeId { file, local }
    }

    /// The root node of a file.
    pub fn root(file: FileId) -> Self {
        NodeId { file, local: 0 }
    }

    pub fn is_root(&self) -> bool {
        self.local == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.0, self.local)
    }
}

/// Unique edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge_{}", self.0)
    }
}

/// Byte offsets into file content. Half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span. An inverted range collapses to an empty span at `start`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} > end {end}");
        Span {
            start,
            end: end.max(start),
        }
    }

    /// Zero-width span at `offset`.
    pub fn empty(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Two spans overlap if they share any byte position, or if one is a
    /// zero-width point strictly inside the other.
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Smallest span covering both.
    pub fn cover(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Union of the disjoint fragments of one construct, e.g. decorators plus the
/// definition they decorate. Fragments are kept sorted and merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ExtendedSpan {
    fragments: Vec<Span>,
}

impl ExtendedSpan {
    pub fn single(span: Span) -> Self {
        ExtendedSpan {
            fragments: vec![span],
        }
    }

    pub fn from_fragments(fragments: impl IntoIterator<Item = Span>) -> Self {
        let mut sorted: Vec<Span> = fragments.into_iter().collect();
        sorted.sort();
        let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
        for span in sorted {
            match merged.last_mut() {
                Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
                _ => merged.push(span),
            }
        }
        ExtendedSpan { fragments: merged }
    }

    /// Add a fragment, keeping the set sorted and merged.
    pub fn with_fragment(mut self, span: Span) -> Self {
        self.fragments.push(span);
        Self::from_fragments(self.fragments)
    }

    pub fn fragments(&self) -> &[Span] {
        &self.fragments
    }

    /// Bounding span from the first fragment's start to the last fragment's end.
    pub fn bounds(&self) -> Span {
        match (self.fragments.first(), self.fragments.last()) {
            (Some(first), Some(last)) => Span::new(first.start, last.end),
            _ => Span::default(),
        }
    }

    pub fn is_multi_fragment(&self) -> bool {
        self.fragments.len() > 1
    }
}

/// Discriminates what kind of code entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    // ── Structural ──────────────────────────────────────────
    File,

    // ── Symbols ─────────────────────────────────────────────
    Module,
    Class,
    Struct,
    Enum,
    Interface,
    Trait,
    Function,
    Method,
    Constant,
    TypeAlias,

    // ── Statements ──────────────────────────────────────────
    Import,

    // ── Expressions ─────────────────────────────────────────
    Call,
    UnionType,
    IntersectionType,

    // ── Fallback ────────────────────────────────────────────
    Unknown,
}

impl NodeKind {
    /// Named definitions that can be looked up and referenced.
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            NodeKind::Module
                | NodeKind::Class
                | NodeKind::Struct
                | NodeKind::Enum
                | NodeKind::Interface
                | NodeKind::Trait
                | NodeKind::Function
                | NodeKind::Method
                | NodeKind::Constant
                | NodeKind::TypeAlias
        )
    }

    pub fn is_import(&self) -> bool {
        matches!(self, NodeKind::Import)
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Call | NodeKind::UnionType | NodeKind::IntersectionType
        )
    }

    pub fn is_statement(&self) -> bool {
        self.is_symbol() || self.is_import()
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Method)
    }

    /// Class-like containers whose members are methods.
    pub fn is_type_definition(&self) -> bool {
        matches!(
            self,
            NodeKind::Class | NodeKind::Struct | NodeKind::Interface | NodeKind::Trait | NodeKind::Enum
        )
    }
}

/// Supported languages for syntax-aware parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    TypeScript,
    Tsx,
    JavaScript,
    Rust,
    Go,
    Java,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => Language::Python,
            Some("ts") | Some("mts") | Some("cts") => Language::TypeScript,
            Some("tsx") => Language::Tsx,
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Language::JavaScript,
            Some("rs") => Language::Rust,
            Some("go") => Language::Go,
            Some("java") => Language::Java,
            _ => Language::Other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Other => "other",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Language::Other)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What kind of relationship this edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Use → definition.
    Reference,
    /// Import → target symbol, file, or external module.
    Dependency,
    /// Class → superclass.
    Inheritance,
}

/// Where an edge points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTarget {
    Node(NodeId),
    /// Third-party or standard-library module, by specifier.
    External(String),
    /// Could not be bound, or the target was deleted.
    Unresolved,
}

impl EdgeTarget {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            EdgeTarget::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, EdgeTarget::Unresolved)
    }
}

/// A directed edge in the code graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: EdgeTarget,
    /// The name through which the relation is expressed in source.
    pub name: String,
}

/// Binding state of an import node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    #[default]
    Pending,
    Resolved,
    External,
    Unresolved,
}
