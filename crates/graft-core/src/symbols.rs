//! Symbol table for cross-file resolution

use crate::model::{FileId, NodeId};
use dashmap::DashMap;

/// Symbol table mapping qualified names to NodeIds. Thread-safe for concurrent access.
pub struct SymbolTable {
    symbols: DashMap<String, NodeId>,
    /// For fast file lookup: file id -> qualified names defined in that file
    file_symbols: DashMap<FileId, Vec<String>>,
    /// Simple name -> every node defining it
    by_name: DashMap<String, Vec<NodeId>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: DashMap::new(),
            file_symbols: DashMap::new(),
            by_name: DashMap::new(),
        }
    }

    /// Insert a symbol. The first definition of a qualified name wins.
    pub fn insert(&self, qualified_name: String, simple_name: &str, node_id: NodeId) {
        self.symbols.entry(qualified_name.clone()).or_insert(node_id);
        self.file_symbols
            .entry(node_id.file)
            .or_default()
            .push(qualified_name);
        self.by_name
            .entry(simple_name.to_string())
            .or_default()
            .push(node_id);
    }

    /// Look up a symbol by qualified name.
    pub fn lookup(&self, qualified_name: &str) -> Option<NodeId> {
        self.symbols.get(qualified_name).map(|r| *r.value())
    }

    /// All nodes defining a symbol with this simple name, in insertion order.
    pub fn lookup_name(&self, name: &str) -> Vec<NodeId> {
        self.by_name
            .get(name)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Get all symbols defined in a file.
    pub fn symbols_in_file(&self, file: FileId) -> Vec<NodeId> {
        self.file_symbols
            .get(&file)
            .map(|r| {
                r.value()
                    .iter()
                    .filter_map(|name| self.symbols.get(name).map(|n| *n.value()))
                    .filter(|id| id.file == file)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove all symbols for a file (incremental re-indexing).
    pub fn remove_file(&self, file: FileId) {
        if let Some((_, names)) = self.file_symbols.remove(&file) {
            for name in names {
                self.symbols.remove_if(&name, |_, id| id.file == file);
            }
        }
        self.by_name.retain(|_, ids| {
            ids.retain(|id| id.file != file);
            !ids.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("symbols", &self.symbols.len())
            .finish()
    }
}
