//! The code graph: files, nodes, the parent index and the edge table.
//!
//! `CodeGraph` is the only writer of spans and text buffers. Node parent links
//! and ordered child lists are indices beside the node store, never ownership.
//! Edges live in a separate [`EdgeTable`] keyed by node id.
//!
//! While a checkpoint is open every mutation journals the state it is about to
//! overwrite, so [`CodeGraph::restore`] can put the graph back exactly.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tree_sitter::Tree;

use crate::checkpoint::{Checkpoint, FileState, ResolutionState};
use crate::diff::{GraphDiff, OffsetMap};
use crate::edges::EdgeTable;
use crate::error::{GraftError, Result};
use crate::model::*;
use crate::node::{FileRecord, NodePayload, NodeRecord, SemanticNode, SymbolData, display_path};
use crate::symbols::SymbolTable;

/// Result of parsing one file's text, ready to install into the graph.
#[derive(Debug, Clone)]
pub struct ParsedContent {
    pub text: String,
    pub tree: Option<Tree>,
    /// Root semantic node. Its kind is forced to `File`.
    pub root: SemanticNode,
    pub syntax_errors: Vec<Span>,
}

/// The code graph: owns files and nodes, indexes symbols and edges.
#[derive(Default)]
pub struct CodeGraph {
    files: BTreeMap<FileId, FileRecord>,
    paths: HashMap<PathBuf, FileId>,
    nodes: HashMap<NodeId, NodeRecord>,
    parents: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    symbols: SymbolTable,
    edges: EdgeTable,
    import_status: HashMap<NodeId, ImportStatus>,
    parse_errors: BTreeMap<PathBuf, String>,
    next_file: u32,
    journal: Option<Checkpoint>,
}

impl std::fmt::Debug for CodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGraph")
            .field("file_count", &self.files.len())
            .field("node_count", &self.nodes.len())
            .field("edge_count", &self.edges.len())
            .finish()
    }
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Files ───────────────────────────────────────────────

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    pub fn file_id(&self, path: &Path) -> Option<FileId> {
        self.paths.get(path).copied()
    }

    pub fn file_by_path(&self, path: &Path) -> Option<&FileRecord> {
        self.file_id(path).and_then(|id| self.files.get(&id))
    }

    /// Files ordered by id.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> + '_ {
        self.files.values()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Files whose parent directory is `dir`, ordered by path.
    pub fn files_in_dir(&self, dir: &Path) -> Vec<FileId> {
        let mut found: Vec<(&PathBuf, FileId)> = self
            .paths
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, id)| (path, *id))
            .collect();
        found.sort();
        found.into_iter().map(|(_, id)| id).collect()
    }

    /// Register an empty file record. Returns the existing id if the path is known.
    pub fn insert_file(&mut self, path: PathBuf, language: Language) -> FileId {
        if let Some(id) = self.paths.get(&path) {
            return *id;
        }
        let id = FileId(self.next_file);
        self.next_file += 1;
        self.touch_file(id);
        self.paths.insert(path.clone(), id);
        self.files.insert(
            id,
            FileRecord {
                id,
                path,
                language,
                text: String::new(),
                tree: None,
                revision: 0,
                next_local: 1,
                nodes: Vec::new(),
                syntax_errors: Vec::new(),
            },
        );
        id
    }

    /// Replace a file's text and node set.
    ///
    /// New nodes whose kind and span match an old node's span (mapped through
    /// `offsets`) keep the old id. Unmatched old nodes are deleted and edges
    /// pointing at them are retargeted to `Unresolved`.
    pub fn replace_contents(
        &mut self,
        file: FileId,
        content: ParsedContent,
        offsets: &OffsetMap,
    ) -> Result<GraphDiff> {
        if !self.files.contains_key(&file) {
            return Err(GraftError::UnknownFile(format!("{file}")));
        }
        self.touch_file(file);

        let (old_ids, next_local, path_str) = {
            let record = &self.files[&file];
            (record.nodes.clone(), record.next_local.max(1), record.display_path())
        };

        let mut candidates: HashMap<(NodeKind, Span), VecDeque<NodeId>> = HashMap::new();
        for id in old_ids.iter().filter(|id| !id.is_root()) {
            if let Some(node) = self.nodes.get(id) {
                if let Some(mapped) = offsets.map_span(node.span) {
                    candidates.entry((node.kind, mapped)).or_default().push_back(*id);
                }
            }
        }

        let mut flat = Flattener {
            file,
            path: path_str,
            candidates,
            next_local,
            scope: Vec::new(),
            out: Vec::new(),
        };
        flat.visit(content.root, None);
        let Flattener { next_local, out, .. } = flat;

        let new_ids: HashSet<NodeId> = out.iter().map(|(node, _)| node.id).collect();
        let old_set: HashSet<NodeId> = old_ids.iter().copied().collect();

        let mut diff = GraphDiff::new(file, 0);
        for id in &old_ids {
            if new_ids.contains(id) {
                diff.kept_nodes.push(*id);
            } else {
                diff.removed_nodes.push(*id);
            }
        }
        diff.added_nodes = out
            .iter()
            .map(|(node, _)| node.id)
            .filter(|id| !old_set.contains(id))
            .collect();

        for id in &diff.removed_nodes {
            self.edges.remove_from(*id);
            self.import_status.remove(id);
            diff.retargeted_edges.extend(self.retarget_incoming(*id));
        }
        for id in &old_ids {
            self.nodes.remove(id);
            self.parents.remove(id);
            self.children.remove(id);
        }
        self.symbols.remove_file(file);

        let mut order = Vec::with_capacity(out.len());
        for (node, parent) in out {
            order.push(node.id);
            if let Some(parent) = parent {
                self.parents.insert(node.id, parent);
                self.children.entry(parent).or_default().push(node.id);
            }
            if let (Some(qualified), Some(name)) = (node.qualified_name(), node.name.as_deref()) {
                self.symbols.insert(qualified.to_string(), name, node.id);
            }
            self.nodes.insert(node.id, node);
        }

        let record = self
            .files
            .get_mut(&file)
            .ok_or_else(|| GraftError::UnknownFile(format!("{file}")))?;
        record.text = content.text;
        record.tree = content.tree;
        record.syntax_errors = content.syntax_errors;
        record.nodes = order;
        record.next_local = next_local;
        record.revision += 1;
        diff.revision = record.revision;

        tracing::debug!(
            "Re-indexed {} (rev {}): +{} -{} ={}",
            record.path.display(),
            record.revision,
            diff.added_nodes.len(),
            diff.removed_nodes.len(),
            diff.kept_nodes.len()
        );
        Ok(diff)
    }

    /// Remove a file and all its nodes. Incoming edges from other files become `Unresolved`.
    pub fn remove_file(&mut self, file: FileId) -> Result<FileRecord> {
        if !self.files.contains_key(&file) {
            return Err(GraftError::UnknownFile(format!("{file}")));
        }
        self.touch_file(file);
        let ids = self.files[&file].nodes.clone();
        for id in &ids {
            self.edges.remove_from(*id);
            self.import_status.remove(id);
        }
        for id in &ids {
            self.retarget_incoming(*id);
            self.nodes.remove(id);
            self.parents.remove(id);
            self.children.remove(id);
        }
        self.symbols.remove_file(file);
        let record = self
            .files
            .remove(&file)
            .ok_or_else(|| GraftError::UnknownFile(format!("{file}")))?;
        self.paths.remove(&record.path);
        Ok(record)
    }

    /// Move a file to a new path, rewriting the qualified names of its symbols.
    pub fn rename_file(&mut self, file: FileId, new_path: PathBuf) -> Result<()> {
        if self.paths.contains_key(&new_path) {
            return Err(GraftError::Io {
                path: new_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "target path is already indexed"),
            });
        }
        if !self.files.contains_key(&file) {
            return Err(GraftError::UnknownFile(format!("{file}")));
        }
        self.touch_file(file);

        let (old_prefix, ids) = {
            let record = &self.files[&file];
            (format!("{}::", record.display_path()), record.nodes.clone())
        };
        let new_prefix = format!("{}::", display_path(&new_path));

        self.symbols.remove_file(file);
        for id in &ids {
            if let Some(node) = self.nodes.get_mut(id) {
                if let NodePayload::Symbol(data) = &mut node.payload {
                    if let Some(rest) = data.qualified_name.strip_prefix(&old_prefix) {
                        data.qualified_name = format!("{new_prefix}{rest}");
                    }
                    if let Some(name) = node.name.as_deref() {
                        self.symbols.insert(data.qualified_name.clone(), name, *id);
                    }
                }
            }
        }

        if let Some(record) = self.files.get_mut(&file) {
            self.paths.remove(&record.path);
            record.path = new_path.clone();
            record.revision += 1;
        }
        self.paths.insert(new_path, file);
        Ok(())
    }

    // ── Nodes ───────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes: files in id order, each in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> + '_ {
        self.files
            .values()
            .flat_map(|f| f.nodes.iter())
            .filter_map(move |id| self.nodes.get(id))
    }

    /// Node ids of one file in pre-order. Each call starts a fresh iterator.
    pub fn nodes_in_file(&self, file: FileId) -> impl Iterator<Item = NodeId> + '_ {
        self.files
            .get(&file)
            .into_iter()
            .flat_map(|f| f.nodes.iter().copied())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children.get(&id).into_iter().flatten().copied()
    }

    /// Walk up the parent index, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            result.push(parent);
            current = parent;
        }
        result
    }

    /// Nearest ancestor whose kind satisfies `pred`.
    pub fn enclosing(&self, id: NodeId, pred: impl Fn(NodeKind) -> bool) -> Option<NodeId> {
        self.ancestors(id)
            .into_iter()
            .find(|a| self.nodes.get(a).is_some_and(|n| pred(n.kind)))
    }

    /// Subtree of `id` in pre-order, including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(kids) = self.children.get(&next) {
                stack.extend(kids.iter().rev().copied());
            }
        }
        out
    }

    /// Source text covered by a node's primary span.
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        let node = self.nodes.get(&id)?;
        self.files.get(&id.file)?.text.get(node.span.start..node.span.end)
    }

    // ── Symbols ─────────────────────────────────────────────

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn find_symbol(&self, qualified_name: &str) -> Option<NodeId> {
        self.symbols.lookup(qualified_name)
    }

    /// A symbol with this simple name in `file`, preferring a top-level definition.
    pub fn symbol_in_file(&self, file: FileId, name: &str) -> Option<NodeId> {
        let record = self.files.get(&file)?;
        let top_level = format!("{}::{}", record.display_path(), name);
        if let Some(id) = self.symbols.lookup(&top_level) {
            if id.file == file {
                return Some(id);
            }
        }
        record.nodes.iter().copied().find(|id| {
            self.nodes
                .get(id)
                .is_some_and(|n| n.kind.is_symbol() && n.name.as_deref() == Some(name))
        })
    }

    /// A direct member of a type definition with this name.
    pub fn member_named(&self, owner: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(owner).into_iter().skip(1).find(|id| {
            self.nodes.get(id).is_some_and(|n| {
                n.kind.is_symbol()
                    && n.name.as_deref() == Some(name)
                    && self.enclosing(*id, |k| k.is_symbol()) == Some(owner)
            })
        })
    }

    // ── Edges ───────────────────────────────────────────────

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.from(source)
    }

    pub fn edges_to(&self, target: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.to(target)
    }

    /// Outgoing edges of every node in a file.
    pub fn edges_of_file(&self, file: FileId) -> impl Iterator<Item = &Edge> + '_ {
        self.nodes_in_file(file).flat_map(move |id| self.edges.from(id))
    }

    pub fn add_edge(&mut self, kind: EdgeKind, source: NodeId, target: EdgeTarget, name: impl Into<String>) -> EdgeId {
        self.touch_resolution(source.file);
        self.edges.insert(kind, source, target, name.into())
    }

    /// Drop all outgoing edges and import statuses of a file, ahead of re-resolution.
    pub fn clear_resolution(&mut self, file: FileId) {
        self.touch_resolution(file);
        let ids: Vec<NodeId> = self.nodes_in_file(file).collect();
        for id in ids {
            self.edges.remove_from(id);
            self.import_status.remove(&id);
        }
    }

    pub fn import_status(&self, import: NodeId) -> ImportStatus {
        self.import_status.get(&import).copied().unwrap_or_default()
    }

    pub fn set_import_status(&mut self, import: NodeId, status: ImportStatus) {
        self.touch_resolution(import.file);
        self.import_status.insert(import, status);
    }

    /// Files with at least one edge into `file`.
    pub fn dependents_of(&self, file: FileId) -> BTreeSet<FileId> {
        self.nodes_in_file(file)
            .flat_map(|id| self.edges.to(id))
            .map(|e| e.source.file)
            .filter(|f| *f != file)
            .collect()
    }

    /// Files owning at least one `Unresolved` edge.
    pub fn files_with_unresolved_edges(&self) -> BTreeSet<FileId> {
        self.edges
            .iter()
            .filter(|e| e.target.is_unresolved())
            .map(|e| e.source.file)
            .collect()
    }

    fn retarget_incoming(&mut self, target: NodeId) -> Vec<EdgeId> {
        let sources: BTreeSet<FileId> = self.edges.to(target).map(|e| e.source.file).collect();
        for file in sources {
            self.touch_resolution(file);
        }
        self.edges.retarget_unresolved(target)
    }

    // ── Parse errors ────────────────────────────────────────

    pub fn record_parse_error(&mut self, path: PathBuf, message: String) {
        self.parse_errors.insert(path, message);
    }

    pub fn clear_parse_error(&mut self, path: &Path) {
        self.parse_errors.remove(path);
    }

    pub fn parse_errors(&self) -> impl Iterator<Item = (&Path, &str)> + '_ {
        self.parse_errors.iter().map(|(p, m)| (p.as_path(), m.as_str()))
    }

    // ── Integrity ───────────────────────────────────────────

    /// Dangling references in the graph, one message per violation.
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for edge in self.edges.iter() {
            if !self.nodes.contains_key(&edge.source) {
                problems.push(format!("{} ({:?} '{}') has missing source {}", edge.id, edge.kind, edge.name, edge.source));
            }
            if let EdgeTarget::Node(target) = edge.target {
                if !self.nodes.contains_key(&target) {
                    problems.push(format!("{} ({:?} '{}') has missing target {}", edge.id, edge.kind, edge.name, target));
                }
            }
        }
        let mut parents: Vec<(&NodeId, &NodeId)> = self.parents.iter().collect();
        parents.sort();
        for (child, parent) in parents {
            if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
                problems.push(format!("parent index entry {child} -> {parent} points at a missing node"));
            }
        }
        problems
    }

    // ── Checkpoints ─────────────────────────────────────────

    /// Start journaling. Any open checkpoint is discarded.
    pub fn begin_checkpoint(&mut self) {
        self.journal = Some(Checkpoint::default());
    }

    /// Stop journaling and hand back what was captured.
    pub fn take_checkpoint(&mut self) -> Option<Checkpoint> {
        self.journal.take()
    }

    pub fn is_journaling(&self) -> bool {
        self.journal.is_some()
    }

    /// Put every captured file and resolution state back.
    ///
    /// Nodes are restored first, then captured outgoing edges under their
    /// original ids. Restored files get a new revision. A captured edge whose
    /// source is gone is dropped, and one whose target is gone comes back
    /// `Unresolved`; the files holding such edges are returned.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> BTreeSet<FileId> {
        self.journal = None;
        let Checkpoint { files, resolution } = checkpoint;

        for (file, state) in files {
            let snapshot_ids: HashSet<NodeId> = state.nodes.iter().map(|n| n.id).collect();
            let current = self.files.get(&file).map(|r| (r.nodes.clone(), r.revision, r.path.clone()));

            if let Some((current_ids, _, _)) = &current {
                for id in current_ids {
                    if !snapshot_ids.contains(id) {
                        self.edges.remove_from(*id);
                        self.edges.retarget_unresolved(*id);
                        self.import_status.remove(id);
                    }
                    self.nodes.remove(id);
                    self.parents.remove(id);
                    self.children.remove(id);
                }
            }
            self.symbols.remove_file(file);
            if let Some((_, _, path)) = &current {
                if self.paths.get(path) == Some(&file) {
                    self.paths.remove(path);
                }
            }

            match state.record {
                None => {
                    self.files.remove(&file);
                }
                Some(mut record) => {
                    let previous = current.as_ref().map(|(_, rev, _)| *rev).unwrap_or(record.revision);
                    record.revision = previous.max(record.revision) + 1;
                    self.paths.insert(record.path.clone(), file);
                    for node in state.nodes {
                        if let (Some(qualified), Some(name)) = (node.qualified_name(), node.name.as_deref()) {
                            self.symbols.insert(qualified.to_string(), name, node.id);
                        }
                        self.nodes.insert(node.id, node);
                    }
                    self.parents.extend(state.parents);
                    self.children.extend(state.children);
                    self.files.insert(file, record);
                }
            }
        }

        let mut demoted = BTreeSet::new();
        for (file, state) in resolution {
            let ids: Vec<NodeId> = self.nodes_in_file(file).collect();
            for id in ids {
                self.edges.remove_from(id);
                self.import_status.remove(&id);
            }
            for mut edge in state.edges {
                if !self.nodes.contains_key(&edge.source) {
                    demoted.insert(file);
                    continue;
                }
                if edge.target.node().is_some_and(|target| !self.nodes.contains_key(&target)) {
                    edge.target = EdgeTarget::Unresolved;
                    demoted.insert(file);
                }
                self.edges.insert_with_id(edge);
            }
            let statuses: Vec<(NodeId, ImportStatus)> = state
                .statuses
                .into_iter()
                .filter(|(id, _)| self.nodes.contains_key(id))
                .collect();
            self.import_status.extend(statuses);
        }
        if !demoted.is_empty() {
            tracing::debug!("Restore left stale edges unresolved in {} file(s)", demoted.len());
        }
        demoted
    }

    /// Put one file back to its state when the open checkpoint began, leaving
    /// the rest of the journal in place. Returns false if the file was untouched.
    pub fn restore_file(&mut self, file: FileId) -> bool {
        let Some(mut journal) = self.journal.take() else {
            return false;
        };
        let mut partial = Checkpoint::default();
        if let Some(state) = journal.files.remove(&file) {
            partial.files.insert(file, state);
        }
        if let Some(state) = journal.resolution.remove(&file) {
            partial.resolution.insert(file, state);
        }
        let touched = !partial.is_empty();
        self.restore(partial);
        self.journal = Some(journal);
        touched
    }

    fn touch_file(&mut self, file: FileId) {
        if self.journal.as_ref().is_none_or(|j| j.files.contains_key(&file)) {
            return;
        }
        self.touch_resolution(file);
        let record = self.files.get(&file).cloned();
        let ids = record.as_ref().map(|r| r.nodes.clone()).unwrap_or_default();
        let state = FileState {
            record,
            nodes: ids.iter().filter_map(|id| self.nodes.get(id).cloned()).collect(),
            parents: ids
                .iter()
                .filter_map(|id| self.parents.get(id).map(|p| (*id, *p)))
                .collect(),
            children: ids
                .iter()
                .filter_map(|id| self.children.get(id).map(|c| (*id, c.clone())))
                .collect(),
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.files.insert(file, state);
        }
    }

    fn touch_resolution(&mut self, file: FileId) {
        if self.journal.as_ref().is_none_or(|j| j.resolution.contains_key(&file)) {
            return;
        }
        let ids: Vec<NodeId> = self.nodes_in_file(file).collect();
        let state = ResolutionState {
            edges: ids.iter().flat_map(|id| self.edges.from(*id).cloned()).collect(),
            statuses: ids
                .iter()
                .filter_map(|id| self.import_status.get(id).map(|s| (*id, *s)))
                .collect(),
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.resolution.insert(file, state);
        }
    }
}

/// Turns a semantic tree into pre-order node records, reusing matched ids.
struct Flattener {
    file: FileId,
    path: String,
    candidates: HashMap<(NodeKind, Span), VecDeque<NodeId>>,
    next_local: u32,
    scope: Vec<String>,
    out: Vec<(NodeRecord, Option<NodeId>)>,
}

impl Flattener {
    fn visit(&mut self, node: SemanticNode, parent: Option<NodeId>) {
        let SemanticNode {
            kind,
            name,
            name_span,
            span,
            extended,
            payload,
            children,
        } = node;

        let (id, kind) = match parent {
            None => (NodeId::root(self.file), NodeKind::File),
            Some(_) => {
                let reused = self
                    .candidates
                    .get_mut(&(kind, span))
                    .and_then(|queue| queue.pop_front());
                let id = reused.unwrap_or_else(|| {
                    let id = NodeId::new(self.file, self.next_local);
                    self.next_local += 1;
                    id
                });
                (id, kind)
            }
        };

        let named_symbol = kind.is_symbol() && name.is_some();
        let payload = match (named_symbol, payload, name.as_deref()) {
            (true, payload, Some(simple)) => {
                let mut data = match payload {
                    NodePayload::Symbol(data) => data,
                    _ => SymbolData::default(),
                };
                let mut qualified = self.path.clone();
                for outer in &self.scope {
                    qualified.push_str("::");
                    qualified.push_str(outer);
                }
                qualified.push_str("::");
                qualified.push_str(simple);
                data.qualified_name = qualified;
                NodePayload::Symbol(data)
            }
            (_, payload, _) => payload,
        };

        if named_symbol {
            if let Some(simple) = &name {
                self.scope.push(simple.clone());
            }
        }

        self.out.push((
            NodeRecord {
                id,
                kind,
                name,
                name_span,
                span,
                extended,
                payload,
            },
            parent,
        ));

        for child in children {
            self.visit(child, Some(id));
        }

        if named_symbol {
            self.scope.pop();
        }
    }
}
