//! Error types shared by every graft crate

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::Span;

/// Machine-readable recovery suggestion attached to errors and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryHint {
    pub code: HintCode,
    pub message: String,
}

impl RecoveryHint {
    pub fn new(code: HintCode, message: impl Into<String>) -> Self {
        RecoveryHint {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintCode {
    CheckGrammarConfiguration,
    FixSyntaxErrors,
    CheckModuleSearchPaths,
    AddExternalPattern,
    ReparseCodebase,
    RollbackLastCommit,
    SplitConflictingEdits,
    RefreshNodeIds,
    CheckFilePermissions,
    FixConfiguration,
    RetryScan,
}

#[derive(thiserror::Error, Debug)]
pub enum GraftError {
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Could not resolve '{module}' imported from {path}")]
    Resolution { path: PathBuf, module: String },

    #[error("Conflicting edits in {path}: transaction {first} {first_span} overlaps transaction {second} {second_span}")]
    TransactionConflict {
        path: PathBuf,
        first: u64,
        first_span: Span,
        second: u64,
        second_span: Span,
    },

    #[error("Graph integrity violated: {}", violations.join("; "))]
    GraphIntegrity { violations: Vec<String> },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown file: {0}")]
    UnknownFile(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("{path} changed after the edit was computed (revision {expected}, now {found})")]
    StaleRevision { path: PathBuf, expected: u64, found: u64 },

    #[error("Cannot roll back: {path} changed after the last commit")]
    RollbackStale { path: PathBuf },

    #[error("Invalid span {span} in {path} (length {len})")]
    InvalidSpan { path: PathBuf, span: Span, len: usize },

    #[error("Unsupported language for {0}")]
    UnsupportedLanguage(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GraftError>;

impl GraftError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraftError::Io {
            path: path.into(),
            source,
        }
    }

    /// Suggested next steps for a caller that hit this error.
    pub fn recovery_hints(&self) -> Vec<RecoveryHint> {
        match self {
            GraftError::Parse { path, .. } => vec![
                RecoveryHint::new(HintCode::FixSyntaxErrors, format!("fix the syntax of {}", path.display())),
                RecoveryHint::new(HintCode::CheckGrammarConfiguration, "confirm the file extension maps to the right grammar"),
            ],
            GraftError::Resolution { module, .. } => vec![
                RecoveryHint::new(HintCode::CheckModuleSearchPaths, format!("add the directory containing '{module}' to module_search_paths")),
                RecoveryHint::new(HintCode::AddExternalPattern, format!("mark '{module}' as external with an external_patterns entry")),
            ],
            GraftError::TransactionConflict { path, .. } => vec![RecoveryHint::new(
                HintCode::SplitConflictingEdits,
                format!("commit the overlapping edits to {} in separate batches", path.display()),
            )],
            GraftError::GraphIntegrity { .. } => vec![
                RecoveryHint::new(HintCode::RollbackLastCommit, "roll back the last committed batch"),
                RecoveryHint::new(HintCode::ReparseCodebase, "re-index the codebase from disk"),
            ],
            GraftError::Io { path, .. } => vec![RecoveryHint::new(
                HintCode::CheckFilePermissions,
                format!("check that {} is readable and writable", path.display()),
            )],
            GraftError::UnknownFile(_) | GraftError::UnknownNode(_) | GraftError::InvalidSpan { .. } => {
                vec![RecoveryHint::new(HintCode::RefreshNodeIds, "re-query the graph; ids and spans may be stale after a commit")]
            }
            GraftError::StaleRevision { path, .. } => vec![RecoveryHint::new(
                HintCode::RefreshNodeIds,
                format!("re-read spans from the current text of {} and queue the edit again", path.display()),
            )],
            GraftError::RollbackStale { path } => vec![RecoveryHint::new(
                HintCode::ReparseCodebase,
                format!("{} was re-indexed since the commit; undo by editing it forward instead", path.display()),
            )],
            GraftError::UnsupportedLanguage(_) => vec![RecoveryHint::new(
                HintCode::CheckGrammarConfiguration,
                "only Python, TypeScript, JavaScript, Rust, Go and Java files are indexed",
            )],
            GraftError::Config(_) => vec![RecoveryHint::new(HintCode::FixConfiguration, "fix graft.toml or remove it to use defaults")],
            GraftError::Cancelled => vec![RecoveryHint::new(HintCode::RetryScan, "start the scan again with a fresh token")],
        }
    }

    /// True for errors scoped to one file that should not abort a batch.
    pub fn is_file_scoped(&self) -> bool {
        !matches!(
            self,
            GraftError::GraphIntegrity { .. } | GraftError::RollbackStale { .. } | GraftError::Cancelled | GraftError::Config(_)
        )
    }
}
