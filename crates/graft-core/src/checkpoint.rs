//! Journal of pre-mutation state, captured lazily while a checkpoint is open.

use std::collections::BTreeMap;

use crate::model::{Edge, FileId, ImportStatus, NodeId};
use crate::node::{FileRecord, NodeRecord};

/// A file's record and nodes as they were before the first mutation.
#[derive(Debug, Clone)]
pub(crate) struct FileState {
    /// `None` when the file did not exist yet.
    pub record: Option<FileRecord>,
    pub nodes: Vec<NodeRecord>,
    pub parents: Vec<(NodeId, NodeId)>,
    pub children: Vec<(NodeId, Vec<NodeId>)>,
}

/// A file's outgoing edges and import statuses before the first change.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolutionState {
    pub edges: Vec<Edge>,
    pub statuses: Vec<(NodeId, ImportStatus)>,
}

/// Everything needed to restore the graph to the moment the checkpoint opened.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    pub(crate) files: BTreeMap<FileId, FileState>,
    pub(crate) resolution: BTreeMap<FileId, ResolutionState>,
}

impl Checkpoint {
    /// Files whose content or node set changed since the checkpoint opened.
    pub fn touched_files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    /// Files whose outgoing edges changed since the checkpoint opened.
    pub fn touched_resolution(&self) -> impl Iterator<Item = FileId> + '_ {
        self.resolution.keys().copied()
    }

    /// Text a file had when the checkpoint opened; `None` if it did not exist.
    pub fn original_text(&self, file: FileId) -> Option<Option<&str>> {
        self.files
            .get(&file)
            .map(|state| state.record.as_ref().map(|r| r.text.as_str()))
    }

    pub fn original_path(&self, file: FileId) -> Option<&std::path::Path> {
        self.files
            .get(&file)
            .and_then(|state| state.record.as_ref())
            .map(|r| r.path.as_path())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.resolution.is_empty()
    }
}
