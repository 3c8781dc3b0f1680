//! Multi-language code graph and codemod engine
//!
//! Re-exports the workspace crates under one roof:
//!
//! - [`core`]: graph model, spans, filesystem abstraction, configuration
//! - [`indexer`]: grammar adapter and parallel scanning
//! - [`engine`]: codebase, resolver, transactions and validation
//! - [`watcher`]: filesystem watching

pub use graft_core as core;
pub use graft_engine as engine;
pub use graft_indexer as indexer;
pub use graft_watcher as watcher;

pub use graft_core::{
    EdgeKind, EdgeTarget, FileId, GraftConfig, GraftError, Language, NodeId, NodeKind, Result, ScanControl, Span,
    ValidationResult, ValidationStatus,
};
pub use graft_engine::{Codebase, CodebaseView, CommitReport, Transaction, TransactionId, TransactionState};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr `fmt` subscriber. `RUST_LOG` wins over `verbose` when set.
/// Calling it again is a no-op.
pub fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("graft={log_level}")));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
