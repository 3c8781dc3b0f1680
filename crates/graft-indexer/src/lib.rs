//! File parsing, dispatch-table conversion and parallel ingestion

pub mod adapter;
pub mod coordinator;
pub mod discovery;
pub mod extractor;
pub mod languages;
pub mod parser_pool;

#[cfg(test)]
mod tests;

pub use adapter::GrammarAdapter;
pub use coordinator::{Coordinator, ParsedFile, ScanFailure, ScanOutcome};
pub use discovery::{SourceFile, discover};
pub use extractor::Extraction;
pub use languages::{Built, DispatchTable, GrammarRegistry, LanguageGrammar, ModuleConventions, Visit};
pub use parser_pool::ParserPool;
