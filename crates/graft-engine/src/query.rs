//! Read-only queries over a locked graph.
//!
//! Every collection query returns a fresh lazy iterator, so calling it again
//! restarts from the beginning.

use std::ops::Deref;
use std::path::Path;
use std::sync::RwLockReadGuard;

use graft_core::{CodeGraph, Edge, EdgeKind, FileRecord, GraftConfig, NodeId, NodeKind, NodeRecord};

/// The graph behind a shared read lock. Derefs to [`CodeGraph`].
pub struct CodebaseView<'a> {
    graph: RwLockReadGuard<'a, CodeGraph>,
    config: &'a GraftConfig,
}

impl Deref for CodebaseView<'_> {
    type Target = CodeGraph;

    fn deref(&self) -> &CodeGraph {
        &self.graph
    }
}

impl<'a> CodebaseView<'a> {
    pub(crate) fn new(graph: RwLockReadGuard<'a, CodeGraph>, config: &'a GraftConfig) -> Self {
        CodebaseView { graph, config }
    }

    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> + '_ {
        self.graph.files()
    }

    /// Functions and methods.
    pub fn functions(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.graph.nodes().filter(|n| n.kind.is_callable())
    }

    /// Classes, structs, interfaces, traits and enums.
    pub fn classes(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.graph.nodes().filter(|n| n.kind.is_type_definition())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.graph.nodes().filter(|n| n.kind.is_symbol())
    }

    pub fn imports(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.graph.nodes().filter(|n| n.kind == NodeKind::Import)
    }

    /// Node ids of the file at `path` (relative to the root), in pre-order.
    pub fn file_nodes(&self, path: &Path) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .file_id(path)
            .into_iter()
            .flat_map(|file| self.graph.nodes_in_file(file))
    }

    /// A symbol by qualified name, or else the first symbol with that simple name.
    pub fn get_symbol(&self, name: &str) -> Option<&NodeRecord> {
        let id = self
            .graph
            .find_symbol(name)
            .or_else(|| self.graph.symbols().lookup_name(name).into_iter().min())?;
        self.graph.node(id)
    }

    /// Edges pointing at `node`: calls, imports and subclasses.
    pub fn usages(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.graph.edges_to(node)
    }

    /// Whether anything outside `node`'s own subtree refers to it. Recursive
    /// calls do not count.
    pub fn is_used(&self, node: NodeId) -> bool {
        let inside = self.graph.descendants(node);
        self.graph.edges_to(node).any(|e| !inside.contains(&e.source))
    }

    /// Top-level functions nothing refers to.
    pub fn unused_functions(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.functions().filter(move |n| {
            n.kind == NodeKind::Function
                && self.graph.parent(n.id).is_some_and(|p| p.is_root())
                && !self.is_used(n.id)
        })
    }

    /// Edges of one kind pointing at `node`.
    pub fn usages_of_kind(&self, node: NodeId, kind: EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        self.graph.edges_to(node).filter(move |e| e.kind == kind)
    }

    /// Outgoing edges of `node` and everything nested in it.
    pub fn dependencies(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.graph
            .descendants(node)
            .into_iter()
            .flat_map(|id| self.graph.edges_from(id))
    }

    /// Owners of a path; empty when no owners map is configured.
    pub fn owners_of(&self, path: &Path) -> Vec<String> {
        self.config.owners_of(path)
    }
}
