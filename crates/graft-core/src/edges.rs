//! Adjacency table for edges, kept apart from node storage

use std::collections::HashMap;

use crate::model::*;

/// Edges keyed by id, indexed by source and by node target.
#[derive(Debug, Default, Clone)]
pub struct EdgeTable {
    edges: HashMap<EdgeId, Edge>,
    outgoing: HashMap<NodeId, Vec<EdgeId>>,
    incoming: HashMap<NodeId, Vec<EdgeId>>,
    next_id: u64,
}

impl EdgeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge and return its freshly assigned id.
    pub fn insert(&mut self, kind: EdgeKind, source: NodeId, target: EdgeTarget, name: String) -> EdgeId {
        let id = EdgeId(self.next_id);
        self.next_id += 1;
        self.insert_with_id(Edge {
            id,
            kind,
            source,
            target,
            name,
        });
        id
    }

    /// Re-insert an edge under its original id (checkpoint restore).
    pub fn insert_with_id(&mut self, edge: Edge) {
        self.next_id = self.next_id.max(edge.id.0 + 1);
        self.outgoing.entry(edge.source).or_default().push(edge.id);
        if let EdgeTarget::Node(target) = edge.target {
            self.incoming.entry(target).or_default().push(edge.id);
        }
        self.edges.insert(edge.id, edge);
    }

    pub fn remove(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        detach(&mut self.outgoing, edge.source, id);
        if let EdgeTarget::Node(target) = edge.target {
            detach(&mut self.incoming, target, id);
        }
        Some(edge)
    }

    pub fn get(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Outgoing edges of a node in insertion order.
    pub fn from(&self, source: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(&source)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.edges.get(id))
    }

    /// Incoming edges of a node in insertion order.
    pub fn to(&self, target: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming
            .get(&target)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.edges.get(id))
    }

    /// Remove every outgoing edge of `source`.
    pub fn remove_from(&mut self, source: NodeId) -> Vec<Edge> {
        let ids = self.outgoing.remove(&source).unwrap_or_default();
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(edge) = self.edges.remove(&id) {
                if let EdgeTarget::Node(target) = edge.target {
                    detach(&mut self.incoming, target, id);
                }
                removed.push(edge);
            }
        }
        removed
    }

    /// Point every edge aimed at `target` to `Unresolved`, keeping ids and names.
    pub fn retarget_unresolved(&mut self, target: NodeId) -> Vec<EdgeId> {
        let ids = self.incoming.remove(&target).unwrap_or_default();
        for id in &ids {
            if let Some(edge) = self.edges.get_mut(id) {
                edge.target = EdgeTarget::Unresolved;
            }
        }
        ids
    }

    /// All edges, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Edge> + '_ {
        let mut ids: Vec<&EdgeId> = self.edges.keys().collect();
        ids.sort();
        ids.into_iter().filter_map(move |id| self.edges.get(id))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

fn detach(index: &mut HashMap<NodeId, Vec<EdgeId>>, node: NodeId, id: EdgeId) {
    if let Some(list) = index.get_mut(&node) {
        list.retain(|e| *e != id);
        if list.is_empty() {
            index.remove(&node);
        }
    }
}
