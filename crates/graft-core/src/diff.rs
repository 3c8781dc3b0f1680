//! Node-set diffs produced when a file is re-indexed

use crate::model::*;
use serde::{Deserialize, Serialize};

/// What changed in one file's node set after a re-parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphDiff {
    pub file: FileId,
    /// File revision after the update.
    pub revision: u64,
    /// Nodes added in this update.
    pub added_nodes: Vec<NodeId>,
    /// Nodes removed in this update.
    pub removed_nodes: Vec<NodeId>,
    /// Nodes matched to an old node and kept under the old id.
    pub kept_nodes: Vec<NodeId>,
    /// Edges retargeted to `Unresolved` because their target was removed.
    pub retargeted_edges: Vec<EdgeId>,
}

impl GraphDiff {
    pub fn new(file: FileId, revision: u64) -> Self {
        GraphDiff {
            file,
            revision,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            kept_nodes: Vec::new(),
            retargeted_edges: Vec::new(),
        }
    }

    /// Check if this diff is empty (no nodes added or removed).
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty() && self.removed_nodes.is_empty()
    }
}

/// Maps old-text spans through a set of applied edits.
///
/// Edits are expressed in old coordinates and must not overlap.
#[derive(Debug, Clone, Default)]
pub struct OffsetMap {
    /// `(old range, new length)`, ascending by start.
    edits: Vec<(Span, usize)>,
}

impl OffsetMap {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_edits(edits: impl IntoIterator<Item = (Span, usize)>) -> Self {
        let mut edits: Vec<(Span, usize)> = edits.into_iter().collect();
        edits.sort_by_key(|(span, _)| (span.start, span.end));
        OffsetMap { edits }
    }

    pub fn is_identity(&self) -> bool {
        self.edits.is_empty()
    }

    /// Map an old span into new coordinates.
    ///
    /// Edits entirely before the span shift it; edits inside it stretch its end.
    /// Returns `None` when an edit straddles one of the span's boundaries.
    /// An insertion exactly at the span's start lands before it, one at its end lands after it.
    pub fn map_span(&self, span: Span) -> Option<Span> {
        let mut start_shift: isize = 0;
        let mut end_shift: isize = 0;
        for (edit, new_len) in &self.edits {
            let delta = *new_len as isize - edit.len() as isize;
            if edit.start < span.start && edit.end > span.start {
                return None;
            }
            if edit.start < span.end && edit.end > span.end {
                return None;
            }
            if edit.end <= span.start {
                start_shift += delta;
                end_shift += delta;
            } else if edit.start < span.end {
                end_shift += delta;
            }
        }
        let start = span.start as isize + start_shift;
        let end = (span.end as isize + end_shift).max(start);
        if start < 0 {
            return None;
        }
        Some(Span::new(start as usize, end as usize))
    }
}
