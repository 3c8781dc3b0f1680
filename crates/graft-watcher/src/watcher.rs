//! Filesystem watcher feeding changes into a [`Codebase`]

use anyhow::Result;
use graft_core::Language;
use graft_engine::Codebase;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File or directory created
    Created(PathBuf),
    /// File or directory modified, including renames
    Modified(PathBuf),
    /// File or directory removed
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// What handling an event did to the codebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Reparsed(PathBuf),
    /// The file's text already matches the graph, e.g. after an engine commit.
    Unchanged(PathBuf),
    Unloaded(PathBuf),
    Ignored(PathBuf),
}

/// File system watcher for monitoring code changes
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                debug!("File system event: {:?}", event);
                Self::handle_notify_event(event, &event_tx);
            }
            Err(e) => error!("File system watch error: {}", e),
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let make: fn(PathBuf) -> WatchEvent = match event.kind {
            notify::EventKind::Create(_) => WatchEvent::Created,
            notify::EventKind::Modify(_) => WatchEvent::Modified,
            notify::EventKind::Remove(_) => WatchEvent::Removed,
            _ => return,
        };
        for path in event.paths {
            if should_ignore_path(&path) {
                continue;
            }
            if let Err(e) = event_tx.send(make(path)) {
                warn!("Failed to forward watch event: {}", e);
            }
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {:?}", path);
        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Stopping watch for: {:?}", path);
        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<WatchEvent> {
        &mut self.event_rx
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }
}

/// Keeps a codebase in step with its directory on disk.
pub struct WatcherService {
    watcher: FileWatcher,
    codebase: Arc<Codebase>,
    gitignore: Gitignore,
}

impl WatcherService {
    pub fn new(codebase: Arc<Codebase>) -> Result<Self> {
        let root = codebase.root().to_path_buf();
        let watcher = FileWatcher::new(&root)?;
        let gitignore = load_gitignore(&root);
        Ok(Self {
            watcher,
            codebase,
            gitignore,
        })
    }

    pub fn codebase(&self) -> &Arc<Codebase> {
        &self.codebase
    }

    pub fn start_watching(&mut self) -> Result<()> {
        let root = self.watcher.root_path().to_path_buf();
        self.watcher.watch_directory(&root)?;
        info!("Started watching project directory: {:?}", root);
        Ok(())
    }

    /// Apply events until the watcher is dropped. Failures on single files
    /// are logged and do not stop the loop.
    pub async fn process_events(&mut self) -> Result<()> {
        loop {
            let Some(event) = self.watcher.event_receiver().recv().await else {
                break;
            };
            if self.is_gitignored(event.path()) {
                continue;
            }
            match handle_event(&self.codebase, event).await {
                Ok(WatchOutcome::Reparsed(path)) => info!("Re-indexed {}", path.display()),
                Ok(WatchOutcome::Unloaded(path)) => info!("Dropped {}", path.display()),
                Ok(outcome) => debug!("Watch event skipped: {:?}", outcome),
                Err(e) => warn!("Failed to apply watch event: {:#}", e),
            }
        }
        Ok(())
    }

    fn is_gitignored(&self, path: &Path) -> bool {
        let relative = self.codebase.relative(path);
        if relative.is_absolute() {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(&relative, false)
            .is_ignore()
    }
}

fn load_gitignore(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let file = root.join(".gitignore");
    if file.is_file() {
        if let Some(e) = builder.add(&file) {
            warn!("Ignoring malformed {}: {}", file.display(), e);
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("Could not build ignore rules for {}: {}", root.display(), e);
        Gitignore::empty()
    })
}

/// Bring the codebase in line with the file an event names.
///
/// Whatever the event kind, the file's current state on disk decides: a
/// missing file is unloaded, a present one is re-parsed unless its text
/// already matches the graph.
pub async fn handle_event(codebase: &Arc<Codebase>, event: WatchEvent) -> Result<WatchOutcome> {
    let relative = codebase.relative(event.path());
    if should_ignore_path(&relative) || !is_code_file(&relative) {
        return Ok(WatchOutcome::Ignored(relative));
    }
    let codebase = Arc::clone(codebase);
    let outcome = tokio::task::spawn_blocking(move || reconcile(&codebase, relative)).await??;
    Ok(outcome)
}

fn reconcile(codebase: &Codebase, relative: PathBuf) -> graft_core::Result<WatchOutcome> {
    let absolute = codebase.root().join(&relative);
    let known = codebase.read().file_id(&relative).is_some();

    if !codebase.fs().exists(&absolute) {
        if !known {
            return Ok(WatchOutcome::Ignored(relative));
        }
        codebase.unload_file(&relative)?;
        return Ok(WatchOutcome::Unloaded(relative));
    }

    let text = codebase.fs().read_to_string(&absolute)?;
    let unchanged = codebase
        .read()
        .file_by_path(&relative)
        .is_some_and(|record| record.text == text);
    if unchanged {
        return Ok(WatchOutcome::Unchanged(relative));
    }
    codebase.parse_file(&relative)?;
    Ok(WatchOutcome::Reparsed(relative))
}

/// Check if a file has a supported source extension
pub fn is_code_file(path: &Path) -> bool {
    Language::from_path(path).is_supported()
}

/// Check if a path should be ignored (e.g., target/, .git/, etc.)
pub fn should_ignore_path(path: &Path) -> bool {
    path.components().any(|component| {
        matches!(
            component.as_os_str().to_str(),
            Some("target" | ".git" | "node_modules" | "__pycache__")
        )
    })
}
