//! Graft Core — graph data model, node store, edge table, and shared infrastructure

pub mod checkpoint;
pub mod config;
pub mod diff;
pub mod edges;
pub mod error;
pub mod graph;
pub mod io;
pub mod model;
pub mod node;
pub mod symbols;
pub mod validation;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use checkpoint::Checkpoint;
pub use config::{EditConfig, GraftConfig, IndexConfig, PathFilter, ResolutionConfig, WhitespaceRule};
pub use diff::{GraphDiff, OffsetMap};
pub use edges::EdgeTable;
pub use error::{GraftError, HintCode, RecoveryHint, Result};
pub use graph::{CodeGraph, ParsedContent};
pub use io::{FileSystem, LocalFs, MemoryFs, ScanControl, ScanProgress, path_to_uri, uri_to_path};
pub use model::{Edge, EdgeId, EdgeKind, EdgeTarget, ExtendedSpan, FileId, ImportStatus, Language, NodeId, NodeKind, Span};
pub use node::{
    Editable, FileRecord, ImportData, ImportedName, NameRef, NodePayload, NodeRecord, ReferenceData, SemanticNode,
    SymbolData,
};
pub use symbols::SymbolTable;
pub use validation::{ValidationResult, ValidationStatus};
