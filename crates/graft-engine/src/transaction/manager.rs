//! Batch commit, rollback and discard.
//!
//! A commit runs under the graph's write lock with a checkpoint open. Text
//! edits are spliced per file in queue order (rightmost first), the file is
//! re-parsed incrementally and re-indexed through an offset map, then file
//! operations run. Affected files are re-resolved and the graph is checked;
//! an integrity violation restores the checkpoint and fails the batch. Only
//! then are changed files written, and a failed write puts back just that file.
//!
//! Text edits carry the file revision their offsets were read from; a file
//! re-indexed in between fails with `StaleRevision` instead of being spliced.
//! Rollback refuses to run once any file the last commit touched has moved
//! on to a newer revision.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use graft_core::io::normalize_path;
use graft_core::{Checkpoint, CodeGraph, FileId, FileSystem, GraftError, Language, OffsetMap, Result, Span};
use graft_indexer::GrammarAdapter;
use tree_sitter::{InputEdit, Point};

use super::queue::{TransactionQueue, find_conflict};
use super::{CommitFailure, CommitReport, EditOp, Transaction, TransactionId, TransactionState, TxTarget};
use crate::resolver::Resolver;

/// What a commit needs besides the graph.
pub struct CommitEnv<'a> {
    pub root: &'a Path,
    pub fs: &'a dyn FileSystem,
    pub adapter: &'a GrammarAdapter,
    pub resolver: &'a Resolver,
}

/// A file's path and text at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    path: PathBuf,
    text: String,
}

#[derive(Debug)]
struct FileChange {
    before: Option<Snapshot>,
    after: Option<Snapshot>,
}

/// The most recent commit, kept for rollback.
#[derive(Debug)]
struct LastBatch {
    checkpoint: Checkpoint,
    changes: Vec<FileChange>,
    transactions: Vec<TransactionId>,
    /// Revision of every journaled file right after the commit, `None` if
    /// the commit left it deleted.
    revisions: BTreeMap<FileId, (PathBuf, Option<u64>)>,
}

#[derive(Debug, Default)]
struct ManagerState {
    queue: TransactionQueue,
    history: BTreeMap<TransactionId, TransactionState>,
    last: Option<LastBatch>,
}

#[derive(Debug, Default)]
pub struct TransactionManager {
    state: Mutex<ManagerState>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn queue(&self, tx: Transaction) -> TransactionId {
        let mut state = self.lock();
        let id = state.queue.push(tx);
        state.history.insert(id, TransactionState::Queued);
        id
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn state(&self, id: TransactionId) -> Option<TransactionState> {
        self.lock().history.get(&id).copied()
    }

    pub fn can_rollback(&self) -> bool {
        self.lock().last.is_some()
    }

    /// Drop every queued transaction without applying it.
    pub fn discard(&self) -> usize {
        let mut state = self.lock();
        let batch = state.queue.drain();
        let ids: Vec<TransactionId> = batch
            .text_edits
            .values()
            .flatten()
            .chain(batch.file_ops.iter())
            .map(|tx| tx.id)
            .collect();
        for id in &ids {
            state.history.insert(*id, TransactionState::Discarded);
        }
        tracing::debug!("Discarded {} queued transactions", ids.len());
        ids.len()
    }

    /// Apply every queued transaction. The caller holds the graph's write lock.
    ///
    /// File-scoped failures land in the report; only an integrity violation
    /// fails the whole batch, after restoring the graph.
    pub fn commit(&self, graph: &mut CodeGraph, env: &CommitEnv<'_>) -> Result<CommitReport> {
        let mut state = self.lock();
        let batch = state.queue.drain();
        if batch.is_empty() {
            return Ok(CommitReport::default());
        }
        let total = batch.len();
        for tx in batch.text_edits.values().flatten().chain(batch.file_ops.iter()) {
            state.history.insert(tx.id, TransactionState::Applying);
        }

        let mut report = CommitReport::default();
        let mut befores: BTreeMap<FileId, Option<Snapshot>> = BTreeMap::new();
        let mut applied: BTreeMap<FileId, Vec<TransactionId>> = BTreeMap::new();
        let mut failed: BTreeSet<FileId> = BTreeSet::new();
        let mut affected: BTreeSet<FileId> = BTreeSet::new();

        graph.begin_checkpoint();

        for (file, edits) in &batch.text_edits {
            let ids: Vec<TransactionId> = edits.iter().map(|tx| tx.id).collect();
            let before = snapshot(graph, *file);
            let dependents = graph.dependents_of(*file);
            match apply_text_edits(graph, env, *file, edits) {
                Ok(()) => {
                    befores.entry(*file).or_insert(before);
                    applied.entry(*file).or_default().extend(ids);
                    affected.insert(*file);
                    affected.extend(dependents);
                }
                Err(error) => {
                    let outcome = match error {
                        GraftError::TransactionConflict { .. } => TransactionState::Conflicted,
                        _ => TransactionState::Failed,
                    };
                    tracing::warn!("Edits to {} not applied: {}", file_label(graph, *file), error);
                    for id in &ids {
                        state.history.insert(*id, outcome);
                    }
                    failed.insert(*file);
                    report.failures.push(CommitFailure {
                        path: file_path(graph, *file),
                        transactions: ids,
                        error,
                    });
                }
            }
        }

        for tx in &batch.file_ops {
            if let Some(file) = tx.file().filter(|f| failed.contains(f)) {
                let path = file_path(graph, file);
                state.history.insert(tx.id, TransactionState::Failed);
                if let Some(failure) = report.failures.iter_mut().find(|f| f.path == path) {
                    failure.transactions.push(tx.id);
                }
                continue;
            }
            let prior = tx.file().map(|f| (f, snapshot(graph, f), graph.dependents_of(f)));
            match apply_file_op(graph, env, tx) {
                Ok(file) => {
                    let (before, dependents) = match prior {
                        Some((_, before, dependents)) => (before, dependents),
                        None => (None, BTreeSet::new()),
                    };
                    befores.entry(file).or_insert(before);
                    applied.entry(file).or_default().push(tx.id);
                    affected.insert(file);
                    affected.extend(dependents);
                }
                Err(error) => {
                    tracing::warn!("{} failed: {}", tx.id, error);
                    state.history.insert(tx.id, TransactionState::Failed);
                    let path = match (&tx.target, prior) {
                        (TxTarget::Path(path), _) => path.clone(),
                        (_, Some((file, _, _))) => file_path(graph, file),
                        (TxTarget::File(file), None) => file_path(graph, *file),
                    };
                    report.failures.push(CommitFailure {
                        path,
                        transactions: vec![tx.id],
                        error,
                    });
                }
            }
        }

        affected.extend(graph.files_with_unresolved_edges());
        let live: Vec<FileId> = affected.into_iter().filter(|f| graph.file(*f).is_some()).collect();
        env.resolver.resolve_files(graph, live);

        let violations = graph.integrity_violations();
        if !violations.is_empty() {
            tracing::error!(
                "Commit broke graph integrity ({} violations); restoring checkpoint",
                violations.len()
            );
            if let Some(checkpoint) = graph.take_checkpoint() {
                graph.restore(checkpoint);
            }
            for id in applied.values().flatten() {
                state.history.insert(*id, TransactionState::Failed);
            }
            return Err(GraftError::GraphIntegrity { violations });
        }

        let mut changes = Vec::new();
        let mut unwritten: BTreeSet<FileId> = BTreeSet::new();
        for (file, before) in befores {
            let after = snapshot(graph, file);
            if before == after {
                continue;
            }
            match sync_disk(env, before.as_ref(), after.as_ref()) {
                Ok(()) => {
                    report.changed_files.push(file);
                    changes.push(FileChange { before, after });
                }
                Err(error) => {
                    tracing::warn!("Could not write {}: {}", file_label(graph, file), error);
                    let path = after.or(before).map(|s| s.path).unwrap_or_default();
                    graph.restore_file(file);
                    unwritten.insert(file);
                    let ids = applied.remove(&file).unwrap_or_default();
                    for id in &ids {
                        state.history.insert(*id, TransactionState::Failed);
                    }
                    report.failures.push(CommitFailure {
                        path,
                        transactions: ids,
                        error,
                    });
                }
            }
        }
        if !unwritten.is_empty() {
            let mut again: BTreeSet<FileId> = unwritten.iter().flat_map(|f| graph.dependents_of(*f)).collect();
            again.extend(graph.files_with_unresolved_edges());
            again.extend(unwritten.iter().copied().filter(|f| graph.file(*f).is_some()));
            env.resolver.resolve_files(graph, again);
        }

        let checkpoint = graph.take_checkpoint().unwrap_or_default();
        let committed: Vec<TransactionId> = applied.into_values().flatten().collect();
        for id in &committed {
            state.history.insert(*id, TransactionState::Committed);
        }
        report.committed = committed.clone();
        tracing::info!(
            "Committed {} of {} transactions, {} file(s) changed, {} failure(s)",
            committed.len(),
            total,
            changes.len(),
            report.failures.len()
        );
        if !committed.is_empty() {
            let revisions = checkpoint
                .touched_files()
                .chain(checkpoint.touched_resolution())
                .map(|file| {
                    let path = match graph.file(file) {
                        Some(record) => record.path.clone(),
                        None => checkpoint
                            .original_path(file)
                            .map(Path::to_path_buf)
                            .unwrap_or_else(|| PathBuf::from(file.to_string())),
                    };
                    (file, (path, graph.file(file).map(|r| r.revision)))
                })
                .collect();
            state.last = Some(LastBatch {
                checkpoint,
                changes,
                transactions: committed,
                revisions,
            });
        }
        Ok(report)
    }

    /// Undo the last committed batch in the graph and on disk.
    ///
    /// Returns `Ok(false)` when there is nothing to roll back, and
    /// `RollbackStale` when a file the batch touched was re-indexed since.
    /// A refused batch cannot be rolled back later either.
    pub fn rollback(&self, graph: &mut CodeGraph, env: &CommitEnv<'_>) -> Result<bool> {
        let mut state = self.lock();
        let Some(last) = state.last.take() else {
            return Ok(false);
        };
        let moved = last
            .revisions
            .iter()
            .find(|(file, (_, revision))| graph.file(**file).map(|r| r.revision) != *revision);
        if let Some((_, (path, _))) = moved {
            tracing::warn!("Refusing rollback: {} changed after the last commit", path.display());
            return Err(GraftError::RollbackStale { path: path.clone() });
        }
        let stale = graph.restore(last.checkpoint);
        if !stale.is_empty() {
            env.resolver.resolve_files(graph, stale);
        }
        let mut first_error = None;
        for change in last.changes.iter().rev() {
            if let Err(error) = sync_disk(env, change.after.as_ref(), change.before.as_ref()) {
                tracing::error!("Rollback could not restore a file on disk: {}", error);
                first_error.get_or_insert(error);
            }
        }
        for id in &last.transactions {
            state.history.insert(*id, TransactionState::RolledBack);
        }
        tracing::info!(
            "Rolled back {} transactions across {} file(s)",
            last.transactions.len(),
            last.changes.len()
        );
        match first_error {
            Some(error) => Err(error),
            None => Ok(true),
        }
    }
}

fn snapshot(graph: &CodeGraph, file: FileId) -> Option<Snapshot> {
    graph.file(file).map(|record| Snapshot {
        path: record.path.clone(),
        text: record.text.clone(),
    })
}

fn file_path(graph: &CodeGraph, file: FileId) -> PathBuf {
    graph
        .file(file)
        .map(|f| f.path.clone())
        .unwrap_or_else(|| PathBuf::from(file.to_string()))
}

fn file_label(graph: &CodeGraph, file: FileId) -> String {
    file_path(graph, file).display().to_string()
}

/// Splice one file's edits, re-parse and re-index it.
fn apply_text_edits(graph: &mut CodeGraph, env: &CommitEnv<'_>, file: FileId, edits: &[Transaction]) -> Result<()> {
    let record = graph
        .file(file)
        .ok_or_else(|| GraftError::UnknownFile(file.to_string()))?;
    let path = record.path.clone();
    let language = record.language;
    let revision = record.revision;
    let mut text = record.text.clone();
    let mut tree = record.tree.clone();

    if let Some(expected) = edits
        .iter()
        .filter_map(|tx| tx.base_revision)
        .find(|base| *base != revision)
    {
        return Err(GraftError::StaleRevision {
            path,
            expected,
            found: revision,
        });
    }

    if let Some((first, second)) = find_conflict(edits) {
        return Err(GraftError::TransactionConflict {
            path,
            first: first.id.0,
            first_span: first.op.span().unwrap_or(Span::empty(0)),
            second: second.id.0,
            second_span: second.op.span().unwrap_or(Span::empty(0)),
        });
    }

    let mut spans = Vec::with_capacity(edits.len());
    for tx in edits {
        let Some(span) = tx.op.span() else {
            continue;
        };
        let valid = span.start <= span.end
            && span.end <= text.len()
            && text.is_char_boundary(span.start)
            && text.is_char_boundary(span.end);
        if !valid {
            return Err(GraftError::InvalidSpan {
                path,
                span,
                len: text.len(),
            });
        }
        spans.push((tx, span));
    }

    let mut offsets = Vec::with_capacity(spans.len());
    for (tx, span) in spans {
        let replacement = tx.op.text();
        let start_position = point_at(&text, span.start);
        let old_end_position = point_at(&text, span.end);
        text.replace_range(span.start..span.end, replacement);
        let new_end = span.start + replacement.len();
        if let Some(tree) = tree.as_mut() {
            tree.edit(&InputEdit {
                start_byte: span.start,
                old_end_byte: span.end,
                new_end_byte: new_end,
                start_position,
                old_end_position,
                new_end_position: point_at(&text, new_end),
            });
        }
        tracing::debug!("{} {} on {}", tx.id, span, path.display());
        offsets.push((span, replacement.len()));
    }

    let content = env.adapter.parse(&path, language, text, tree.as_ref())?;
    graph.replace_contents(file, content, &OffsetMap::from_edits(offsets))?;
    Ok(())
}

/// Row and byte column of `offset`.
fn point_at(text: &str, offset: usize) -> Point {
    let before = &text.as_bytes()[..offset];
    let row = before.iter().filter(|b| **b == b'\n').count();
    let column = match before.iter().rposition(|b| *b == b'\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    Point { row, column }
}

/// Create, rename or delete a file in the graph. Returns the file touched.
fn apply_file_op(graph: &mut CodeGraph, env: &CommitEnv<'_>, tx: &Transaction) -> Result<FileId> {
    match (&tx.target, &tx.op) {
        (TxTarget::Path(path), EditOp::CreateFile { text }) => {
            let path = normalize_path(path);
            if graph.file_id(&path).is_some() || env.fs.exists(&env.root.join(&path)) {
                return Err(already_exists(path));
            }
            let language = Language::from_path(&path);
            if !env.adapter.supports(language) {
                return Err(GraftError::UnsupportedLanguage(path));
            }
            let content = env.adapter.parse(&path, language, text.clone(), None)?;
            let file = graph.insert_file(path, language);
            graph.replace_contents(file, content, &OffsetMap::identity())?;
            tracing::debug!("{} created {}", tx.id, file_label(graph, file));
            Ok(file)
        }
        (TxTarget::File(file), EditOp::RenameFile { to }) => {
            let to = normalize_path(to);
            if graph.file_id(&to).is_none() && env.fs.exists(&env.root.join(&to)) {
                return Err(already_exists(to));
            }
            graph.rename_file(*file, to)?;
            tracing::debug!("{} renamed {} to {}", tx.id, file, file_label(graph, *file));
            Ok(*file)
        }
        (TxTarget::File(file), EditOp::DeleteFile) => {
            let record = graph.remove_file(*file)?;
            tracing::debug!("{} deleted {}", tx.id, record.path.display());
            Ok(*file)
        }
        (TxTarget::Path(path), _) => Err(GraftError::UnknownFile(path.display().to_string())),
        (TxTarget::File(file), _) => Err(GraftError::UnknownFile(file.to_string())),
    }
}

fn already_exists(path: PathBuf) -> GraftError {
    GraftError::io(
        path,
        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "a file already exists at this path"),
    )
}

/// Make the disk go from `from` to `to` for one file.
fn sync_disk(env: &CommitEnv<'_>, from: Option<&Snapshot>, to: Option<&Snapshot>) -> Result<()> {
    match (from, to) {
        (None, None) => Ok(()),
        (None, Some(to)) => env.fs.write(&env.root.join(&to.path), to.text.as_bytes()),
        (Some(from), None) => env.fs.remove(&env.root.join(&from.path)),
        (Some(from), Some(to)) => {
            let old = env.root.join(&from.path);
            let new = env.root.join(&to.path);
            let moved = from.path != to.path;
            if moved {
                env.fs.rename(&old, &new)?;
            }
            if from.text != to.text {
                if let Err(error) = env.fs.write(&new, to.text.as_bytes()) {
                    if moved {
                        if let Err(undo) = env.fs.rename(&new, &old) {
                            tracing::warn!("Could not move {} back: {}", new.display(), undo);
                        }
                    }
                    return Err(error);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_at_counts_rows_and_byte_columns() {
        let text = "ab\ncdé\nf";
        assert_eq!(point_at(text, 0), Point { row: 0, column: 0 });
        assert_eq!(point_at(text, 4), Point { row: 1, column: 1 });
        assert_eq!(point_at(text, text.len()), Point { row: 2, column: 1 });
    }
}
