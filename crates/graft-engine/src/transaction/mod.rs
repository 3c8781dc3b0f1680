//! Queued edits and their batch application.

pub mod manager;
pub mod queue;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use graft_core::{FileId, GraftError, Result, Span};
use serde::{Deserialize, Serialize};

pub use manager::TransactionManager;
pub use queue::TransactionQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Queued,
    /// Drained from the queue into a commit.
    Sorted,
    Applying,
    Committed,
    RolledBack,
    Conflicted,
    Failed,
    Discarded,
}

/// What a transaction does to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Insert { offset: usize, text: String },
    Replace { span: Span, text: String },
    Delete { span: Span },
    CreateFile { text: String },
    RenameFile { to: PathBuf },
    DeleteFile,
}

impl EditOp {
    /// The byte range a text edit replaces, `None` for file operations.
    pub fn span(&self) -> Option<Span> {
        match self {
            EditOp::Insert { offset, .. } => Some(Span::empty(*offset)),
            EditOp::Replace { span, .. } | EditOp::Delete { span } => Some(*span),
            _ => None,
        }
    }

    /// Replacement text of a text edit.
    pub fn text(&self) -> &str {
        match self {
            EditOp::Insert { text, .. } | EditOp::Replace { text, .. } => text,
            _ => "",
        }
    }

    pub fn is_file_op(&self) -> bool {
        self.span().is_none()
    }
}

/// Text edits and deletes/renames address an indexed file; file creation
/// addresses a path that is not in the graph yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxTarget {
    File(FileId),
    Path(PathBuf),
}

/// One queued edit.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    /// Queue order; assigned when queued.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub target: TxTarget,
    pub op: EditOp,
    pub state: TransactionState,
    /// Revision of the target file the span was computed against. A commit
    /// fails the file if its revision has moved since.
    pub base_revision: Option<u64>,
}

impl Transaction {
    fn new(target: TxTarget, op: EditOp) -> Self {
        Transaction {
            id: TransactionId(0),
            seq: 0,
            created_at: Utc::now(),
            target,
            op,
            state: TransactionState::Queued,
            base_revision: None,
        }
    }

    /// Pin a text edit to the file revision its offsets were read from.
    pub fn at_revision(mut self, revision: u64) -> Self {
        self.base_revision = Some(revision);
        self
    }

    pub fn insert(file: FileId, offset: usize, text: impl Into<String>) -> Self {
        Self::new(TxTarget::File(file), EditOp::Insert { offset, text: text.into() })
    }

    pub fn replace(file: FileId, span: Span, text: impl Into<String>) -> Self {
        Self::new(TxTarget::File(file), EditOp::Replace { span, text: text.into() })
    }

    pub fn delete(file: FileId, span: Span) -> Self {
        Self::new(TxTarget::File(file), EditOp::Delete { span })
    }

    /// `path` is relative to the project root.
    pub fn create_file(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self::new(TxTarget::Path(path.into()), EditOp::CreateFile { text: text.into() })
    }

    pub fn rename_file(file: FileId, to: impl Into<PathBuf>) -> Self {
        Self::new(TxTarget::File(file), EditOp::RenameFile { to: to.into() })
    }

    pub fn delete_file(file: FileId) -> Self {
        Self::new(TxTarget::File(file), EditOp::DeleteFile)
    }

    pub fn file(&self) -> Option<FileId> {
        match self.target {
            TxTarget::File(file) => Some(file),
            TxTarget::Path(_) => None,
        }
    }
}

/// A file whose part of the batch was not applied.
#[derive(Debug)]
pub struct CommitFailure {
    pub path: PathBuf,
    pub transactions: Vec<TransactionId>,
    pub error: GraftError,
}

/// Outcome of one commit.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub committed: Vec<TransactionId>,
    pub failures: Vec<CommitFailure>,
    /// Files whose text, path or existence changed.
    pub changed_files: Vec<FileId>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first file failure as an error, for callers that treat any failure as fatal.
    pub fn into_result(mut self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.remove(0).error)
        }
    }
}
