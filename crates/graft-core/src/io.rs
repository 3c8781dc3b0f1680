//! Filesystem abstraction, path helpers, and scan progress/cancellation.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use dashmap::DashMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{GraftError, Result};

/// Storage the engine reads sources from and writes edits to.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn remove(&self, path: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    /// Every file under `root`, sorted.
    fn list(&self, root: &Path) -> Result<Vec<PathBuf>>;

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| {
            GraftError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// The real disk. `list` honours `.gitignore` and skips hidden entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| GraftError::io(path, e))
    }

    /// Writes a sibling temp file and renames it over `path`, so readers see
    /// the old contents or the new ones, never a partial write.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| GraftError::io(parent, e))?;
        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| GraftError::io(parent, e))?;
        temp.write_all(contents).map_err(|e| GraftError::io(temp.path(), e))?;
        if let Ok(metadata) = std::fs::metadata(path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| GraftError::io(path, e))?;
        }
        temp.persist(path).map_err(|e| GraftError::io(path, e.error))?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| GraftError::io(path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GraftError::io(parent, e))?;
        }
        std::fs::rename(from, to).map_err(|e| GraftError::io(from, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(root).require_git(false).build();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_some_and(|t| t.is_file()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e),
            }
        }
        files.sort();
        Ok(files)
    }
}

/// In-memory filesystem for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: DashMap<PathBuf, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<Vec<u8>>,
    {
        let fs = Self::new();
        for (path, contents) in files {
            fs.files.insert(path.into(), contents.into());
        }
        fs
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn get_string(&self, path: &Path) -> Option<String> {
        self.files
            .get(path)
            .map(|c| String::from_utf8_lossy(c.value()).into_owned())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn not_found(path: &Path) -> GraftError {
    GraftError::io(path, std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
}

impl FileSystem for MemoryFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|c| c.value().clone())
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (_, contents) = self.files.remove(from).ok_or_else(|| not_found(from))?;
        self.files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn list(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = self
            .files
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|path| path.starts_with(root))
            .collect();
        files.sort();
        Ok(files)
    }
}

// ── Paths ───────────────────────────────────────────────

const URI_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `file://` URI for an absolute path, percent-encoding reserved bytes.
pub fn path_to_uri(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let encoded = utf8_percent_encode(&text, URI_PATH).to_string();
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

/// Inverse of [`path_to_uri`].
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let rest = uri
        .strip_prefix("file://")
        .ok_or_else(|| GraftError::UnknownFile(format!("not a file URI: {uri}")))?;
    let decoded = percent_decode_str(rest)
        .decode_utf8()
        .map_err(|e| GraftError::UnknownFile(format!("{uri}: {e}")))?;
    Ok(PathBuf::from(decoded.into_owned()))
}

/// Resolve `.` and `..` components without touching the disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `to` as seen from directory `from_dir`, both relative to the same root.
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let base = normalize_path(from_dir);
    let from: Vec<Component> = base.components().collect();
    let target = normalize_path(to);
    let to_parts: Vec<Component> = target.components().collect();
    let common = from
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for part in &to_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

// ── Progress & cancellation ─────────────────────────────

/// Progress events emitted by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanProgress {
    Started { total: usize },
    FileParsed { path: PathBuf, done: usize, total: usize },
    FileFailed { path: PathBuf, message: String },
    Finished { parsed: usize, failed: usize },
    Cancelled { done: usize },
}

/// Cancellation token plus an optional progress sink for one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    token: CancellationToken,
    progress: Option<mpsc::UnboundedSender<ScanProgress>>,
}

impl ScanControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// A control wired to a fresh progress channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ScanControl {
                token: CancellationToken::new(),
                progress: Some(tx),
            },
            rx,
        )
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Send a progress event. A dropped receiver is not an error.
    pub fn report(&self, event: ScanProgress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}
