//! A parsed, resolved project and the entry point for queries and edits.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use graft_core::io::normalize_path;
use graft_core::{
    CodeGraph, FileId, FileSystem, GraftConfig, GraftError, Language, LocalFs, NodeId, OffsetMap, Result, ScanControl,
    ValidationResult,
};
use graft_indexer::{Coordinator, GrammarAdapter};
use serde::Serialize;

use crate::query::CodebaseView;
use crate::resolver::{ImportCycle, ResolutionReport, Resolver, find_import_cycles};
use crate::transaction::manager::CommitEnv;
use crate::transaction::{CommitReport, Transaction, TransactionId, TransactionManager, TransactionState};
use crate::validator;

/// Counts from a full load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub parsed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub resolution: ResolutionReport,
}

/// One project: its files, the graph built from them, and pending edits.
///
/// Queries share a read lock on the graph. Commits, loads and re-parses take
/// the write lock for their whole duration.
pub struct Codebase {
    root: PathBuf,
    config: GraftConfig,
    fs: Arc<dyn FileSystem>,
    adapter: GrammarAdapter,
    resolver: Resolver,
    graph: RwLock<CodeGraph>,
    transactions: TransactionManager,
}

impl std::fmt::Debug for Codebase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codebase")
            .field("root", &self.root)
            .field("files", &self.read().file_count())
            .field("pending", &self.transactions.pending())
            .finish()
    }
}

impl Codebase {
    /// An empty codebase; call [`Codebase::load`] to index it.
    pub fn new(root: impl Into<PathBuf>, config: GraftConfig, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let adapter = GrammarAdapter::new();
        let resolver = Resolver::new(adapter.clone(), config.resolution.clone())?;
        Ok(Codebase {
            root: root.into(),
            config,
            fs,
            adapter,
            resolver,
            graph: RwLock::new(CodeGraph::new()),
            transactions: TransactionManager::new(),
        })
    }

    /// Index a directory on disk using its `graft.toml`, if any.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = GraftConfig::load_or_default(&root)?;
        let codebase = Self::new(root, config, Arc::new(LocalFs))?;
        codebase.load(&ScanControl::new())?;
        Ok(codebase)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &GraftConfig {
        &self.config
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn adapter(&self) -> &GrammarAdapter {
        &self.adapter
    }

    /// Shared read access for queries.
    pub fn read(&self) -> CodebaseView<'_> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        CodebaseView::new(graph, &self.config)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CodeGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn graph_mut(&self) -> RwLockWriteGuard<'_, CodeGraph> {
        self.write()
    }

    fn commit_env(&self) -> CommitEnv<'_> {
        CommitEnv {
            root: &self.root,
            fs: self.fs.as_ref(),
            adapter: &self.adapter,
            resolver: &self.resolver,
        }
    }

    /// A path relative to the project root; absolute paths under the root are stripped.
    pub fn relative(&self, path: &Path) -> PathBuf {
        let path = normalize_path(path);
        match path.strip_prefix(&self.root) {
            Ok(rest) => rest.to_path_buf(),
            Err(_) => path,
        }
    }

    /// Parse every source file in parallel, then install and resolve them
    /// under one write lock. A cancelled scan leaves the graph untouched.
    pub fn load(&self, control: &ScanControl) -> Result<LoadSummary> {
        let coordinator = Coordinator::new(self.adapter.clone(), self.config.index.clone());
        let outcome = coordinator.scan(self.fs.as_ref(), &self.root, control)?;

        let mut graph = self.write();
        let mut summary = LoadSummary {
            parsed: outcome.parsed.len(),
            failed: outcome.failures.len(),
            skipped: outcome.skipped.len(),
            resolution: ResolutionReport::default(),
        };
        for failure in outcome.failures {
            graph.record_parse_error(failure.path, failure.error.to_string());
        }
        for file in outcome.parsed {
            graph.clear_parse_error(&file.path);
            let id = graph.insert_file(file.path, file.language);
            graph.replace_contents(id, file.content, &OffsetMap::identity())?;
        }
        let files: Vec<FileId> = graph.files().map(|f| f.id).collect();
        summary.resolution = self.resolver.resolve_files(&mut graph, files);
        tracing::info!(
            "Loaded {}: {} files, {} nodes, {} edges, {} failed",
            self.root.display(),
            graph.file_count(),
            graph.node_count(),
            graph.edge_count(),
            summary.failed
        );
        Ok(summary)
    }

    /// Read, parse and re-index one file, then re-resolve it and the files that
    /// depend on it. A failure is also recorded in [`Codebase::parse_errors`].
    pub fn parse_file(&self, path: &Path) -> Result<FileId> {
        let relative = self.relative(path);
        let language = Language::from_path(&relative);
        if !self.adapter.supports(language) {
            return Err(GraftError::UnsupportedLanguage(relative));
        }
        let parsed = self
            .fs
            .read_to_string(&self.root.join(&relative))
            .and_then(|text| self.adapter.parse(&relative, language, text, None));

        let mut graph = self.write();
        let content = match parsed {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!("Failed to parse {}: {}", relative.display(), error);
                graph.record_parse_error(relative, error.to_string());
                return Err(error);
            }
        };
        graph.clear_parse_error(&relative);
        let mut affected: BTreeSet<FileId> = graph
            .file_id(&relative)
            .map(|id| graph.dependents_of(id))
            .unwrap_or_default();
        let id = graph.insert_file(relative, language);
        graph.replace_contents(id, content, &OffsetMap::identity())?;
        affected.insert(id);
        affected.extend(graph.files_with_unresolved_edges());
        self.resolver.resolve_files(&mut graph, affected);
        Ok(id)
    }

    /// Forget a file. Edges into it from other files become unresolved.
    pub fn unload_file(&self, path: &Path) -> Result<()> {
        let relative = self.relative(path);
        let mut graph = self.write();
        graph.clear_parse_error(&relative);
        let id = graph
            .file_id(&relative)
            .ok_or_else(|| GraftError::UnknownFile(relative.display().to_string()))?;
        let dependents = graph.dependents_of(id);
        graph.remove_file(id)?;
        self.resolver.resolve_files(&mut graph, dependents);
        tracing::debug!("Unloaded {}", relative.display());
        Ok(())
    }

    pub fn find_symbol(&self, qualified_name: &str) -> Option<NodeId> {
        self.read().find_symbol(qualified_name)
    }

    /// Node ids of a file in pre-order, empty for an unknown path.
    pub fn nodes_in_file(&self, path: &Path) -> Vec<NodeId> {
        let relative = self.relative(path);
        let view = self.read();
        match view.file_id(&relative) {
            Some(file) => view.nodes_in_file(file).collect(),
            None => Vec::new(),
        }
    }

    /// Files that could not be read or parsed, with the reason.
    pub fn parse_errors(&self) -> Vec<(PathBuf, String)> {
        self.read()
            .parse_errors()
            .map(|(path, message)| (path.to_path_buf(), message.to_string()))
            .collect()
    }

    /// Re-bind one file's imports and references.
    pub fn resolve_imports(&self, path: &Path) -> Result<ResolutionReport> {
        let relative = self.relative(path);
        let mut graph = self.write();
        let file = graph
            .file_id(&relative)
            .ok_or_else(|| GraftError::UnknownFile(relative.display().to_string()))?;
        Ok(self.resolver.resolve_file(&mut graph, file))
    }

    pub fn import_cycles(&self) -> Vec<ImportCycle> {
        find_import_cycles(&self.read())
    }

    pub fn validate(&self) -> ValidationResult {
        validator::validate(&self.read(), &self.config.resolution)
    }

    // ── Transactions ────────────────────────────────────────

    /// Queue an edit. A text edit not yet pinned to a revision is pinned to
    /// its file's current one.
    pub fn queue(&self, mut tx: Transaction) -> TransactionId {
        if tx.base_revision.is_none() && !tx.op.is_file_op() {
            if let Some(file) = tx.file() {
                tx.base_revision = self.read().file(file).map(|record| record.revision);
            }
        }
        self.transactions.queue(tx)
    }

    pub fn pending(&self) -> usize {
        self.transactions.pending()
    }

    pub fn transaction_state(&self, id: TransactionId) -> Option<TransactionState> {
        self.transactions.state(id)
    }

    /// Apply every queued transaction as one batch.
    pub fn commit(&self) -> Result<CommitReport> {
        let mut graph = self.write();
        self.transactions.commit(&mut graph, &self.commit_env())
    }

    /// Undo the last committed batch. `Ok(false)` when there is none.
    pub fn rollback(&self) -> Result<bool> {
        let mut graph = self.write();
        self.transactions.rollback(&mut graph, &self.commit_env())
    }

    /// Drop queued transactions without applying them.
    pub fn discard(&self) -> usize {
        self.transactions.discard()
    }
}
