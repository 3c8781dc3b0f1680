//! Codebase context, resolver, transactions, validation and codemods

pub mod codebase;
pub mod mutation;
pub mod project;
pub mod query;
pub mod resolver;
pub mod transaction;
pub mod validator;


pub use codebase::{Codebase, LoadSummary};
pub use mutation::deletion_span;
pub use project::{ProjectArena, ProjectId};
pub use query::CodebaseView;
pub use resolver::{ImportCycle, ResolutionFailure, ResolutionReport, Resolver, find_import_cycles};
pub use transaction::{
    CommitFailure, CommitReport, EditOp, Transaction, TransactionId, TransactionManager, TransactionState, TxTarget,
};
pub use validator::validate;
