//! Orchestrates parallel indexing
//!
//! Files are read and parsed on rayon workers. Each worker only produces a
//! per-file result; nothing touches the graph here, so a cancelled scan leaves
//! the caller's graph exactly as it was.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use graft_core::{FileSystem, GraftError, IndexConfig, Language, ParsedContent, Result, ScanControl, ScanProgress};
use rayon::prelude::*;

use crate::adapter::GrammarAdapter;
use crate::discovery::{SourceFile, discover};

/// One successfully parsed file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub language: Language,
    pub content: ParsedContent,
}

#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: GraftError,
}

/// Everything a completed scan produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub parsed: Vec<ParsedFile>,
    pub failures: Vec<ScanFailure>,
    /// Files over `max_file_bytes`.
    pub skipped: Vec<PathBuf>,
}

enum FileResult {
    Parsed(ParsedFile),
    Failed(ScanFailure),
    Skipped(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    adapter: GrammarAdapter,
    config: IndexConfig,
}

impl Coordinator {
    pub fn new(adapter: GrammarAdapter, config: IndexConfig) -> Self {
        Coordinator { adapter, config }
    }

    pub fn adapter(&self) -> &GrammarAdapter {
        &self.adapter
    }

    /// Discover and parse every source file under `root`.
    ///
    /// Returns `Err(Cancelled)` if the token fires before the scan completes.
    pub fn scan(&self, fs: &dyn FileSystem, root: &Path, control: &ScanControl) -> Result<ScanOutcome> {
        let files = discover(fs, root, &self.config, self.adapter.registry())?;
        tracing::info!("Scanning {} files under {}", files.len(), root.display());

        let results = if self.config.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .thread_name(|i| format!("graft-parse-{i}"))
                .build()
                .map_err(|e| GraftError::Config(format!("cannot build parser threads: {e}")))?;
            pool.install(|| self.parse_all(fs, root, &files, control))
        } else {
            self.parse_all(fs, root, &files, control)
        };

        if control.is_cancelled() {
            let done = results.len();
            tracing::info!("Scan cancelled after {} files", done);
            control.report(ScanProgress::Cancelled { done });
            return Err(GraftError::Cancelled);
        }

        let mut outcome = ScanOutcome::default();
        for result in results {
            match result {
                FileResult::Parsed(file) => outcome.parsed.push(file),
                FileResult::Failed(failure) => outcome.failures.push(failure),
                FileResult::Skipped(path) => outcome.skipped.push(path),
            }
        }
        outcome.parsed.sort_by(|a, b| a.path.cmp(&b.path));
        outcome.failures.sort_by(|a, b| a.path.cmp(&b.path));
        control.report(ScanProgress::Finished {
            parsed: outcome.parsed.len(),
            failed: outcome.failures.len(),
        });
        tracing::info!(
            "Scan finished: {} parsed, {} failed, {} skipped",
            outcome.parsed.len(),
            outcome.failures.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    fn parse_all(&self, fs: &dyn FileSystem, root: &Path, files: &[SourceFile], control: &ScanControl) -> Vec<FileResult> {
        let total = files.len();
        control.report(ScanProgress::Started { total });
        let done = AtomicUsize::new(0);
        files
            .par_iter()
            .filter_map(|file| {
                if control.is_cancelled() {
                    return None;
                }
                let result = self.read_and_parse(fs, root, file);
                let done = done.fetch_add(1, Ordering::Relaxed) + 1;
                match &result {
                    FileResult::Failed(failure) => {
                        tracing::warn!("Failed to parse {}: {}", file.path.display(), failure.error);
                        control.report(ScanProgress::FileFailed {
                            path: file.path.clone(),
                            message: failure.error.to_string(),
                        });
                    }
                    _ => control.report(ScanProgress::FileParsed {
                        path: file.path.clone(),
                        done,
                        total,
                    }),
                }
                Some(result)
            })
            .collect()
    }

    fn read_and_parse(&self, fs: &dyn FileSystem, root: &Path, file: &SourceFile) -> FileResult {
        let absolute = root.join(&file.path);
        let bytes = match fs.read(&absolute) {
            Ok(bytes) => bytes,
            Err(error) => {
                return FileResult::Failed(ScanFailure {
                    path: file.path.clone(),
                    error,
                });
            }
        };
        if bytes.len() as u64 > self.config.max_file_bytes {
            tracing::debug!("Skipping {} ({} bytes)", file.path.display(), bytes.len());
            return FileResult::Skipped(file.path.clone());
        }
        let parsed = String::from_utf8(bytes)
            .map_err(|e| GraftError::io(&file.path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
            .and_then(|text| self.adapter.parse(&file.path, file.language, text, None));
        match parsed {
            Ok(content) => {
                tracing::debug!("Parsed {}", file.path.display());
                FileResult::Parsed(ParsedFile {
                    path: file.path.clone(),
                    language: file.language,
                    content,
                })
            }
            Err(error) => FileResult::Failed(ScanFailure {
                path: file.path.clone(),
                error,
            }),
        }
    }
}
