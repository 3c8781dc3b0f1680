//! Keeps an indexed codebase in step with the filesystem

pub mod watcher;

pub use watcher::{FileWatcher, WatchEvent, WatchOutcome, WatcherService, handle_event, is_code_file, should_ignore_path};
