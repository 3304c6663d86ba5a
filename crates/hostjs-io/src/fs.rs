//! File system collaborator.
//!
//! Relative paths are resolved against a base path; absolute paths are used as
//! given. The default implementation performs all I/O on the shared scheduler.

use crate::error::{ProviderError, ProviderResult};
use crate::scheduler;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::trace;

/// Completion callback for an asynchronous provider operation.
///
/// Being `FnOnce`, it cannot fire twice. Providers must call it exactly once.
pub type Completion<T> = Box<dyn FnOnce(ProviderResult<T>) + Send + 'static>;

/// Result of a `stat` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatResult {
    pub exists: bool,
    pub is_directory: bool,
    pub is_file: bool,
    /// Modification time in milliseconds since the Unix epoch, 0 if unknown
    pub last_modified: i64,
}

/// File system capability consumed by scripts through `_fileSystem`.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &str, done: Completion<Vec<u8>>);

    fn write(&self, path: &str, data: Vec<u8>, done: Completion<()>);

    fn move_file(&self, from: &str, to: &str, done: Completion<()>);

    fn remove(&self, path: &str, done: Completion<()>);

    fn stat(&self, path: &str, done: Completion<StatResult>);

    /// Resolve `path` to an absolute path string. Synchronous.
    fn resolve(&self, path: &str) -> ProviderResult<String>;
}

/// OS-backed file system rooted at a base path.
#[derive(Debug, Clone)]
pub struct DefaultFileSystem {
    base_path: PathBuf,
}

impl Default for DefaultFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultFileSystem {
    /// Create a file system rooted at the current working directory.
    pub fn new() -> Self {
        let base_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { base_path }
    }

    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, path: &str) -> ProviderResult<PathBuf> {
        if path.is_empty() {
            return Err(ProviderError::InvalidPath("path is empty".to_string()));
        }
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            Ok(candidate.to_path_buf())
        } else {
            Ok(self.base_path.join(candidate))
        }
    }
}

impl FileSystem for DefaultFileSystem {
    fn read(&self, path: &str, done: Completion<Vec<u8>>) {
        let full = match self.resolve_path(path) {
            Ok(full) => full,
            Err(e) => return done(Err(e)),
        };
        trace!(path = %full.display(), "read");
        scheduler::spawn_with_completion(
            async move {
                tokio::fs::read(&full)
                    .await
                    .map_err(|e| ProviderError::io(full.display().to_string(), e))
            },
            done,
        );
    }

    fn write(&self, path: &str, data: Vec<u8>, done: Completion<()>) {
        let full = match self.resolve_path(path) {
            Ok(full) => full,
            Err(e) => return done(Err(e)),
        };
        trace!(path = %full.display(), bytes = data.len(), "write");
        scheduler::spawn_with_completion(
            async move {
                tokio::fs::write(&full, data)
                    .await
                    .map_err(|e| ProviderError::io(full.display().to_string(), e))
            },
            done,
        );
    }

    fn move_file(&self, from: &str, to: &str, done: Completion<()>) {
        let (from, to) = match (self.resolve_path(from), self.resolve_path(to)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(e), _) | (_, Err(e)) => return done(Err(e)),
        };
        trace!(from = %from.display(), to = %to.display(), "move");
        scheduler::spawn_with_completion(
            async move {
                tokio::fs::rename(&from, &to)
                    .await
                    .map_err(|e| ProviderError::io(from.display().to_string(), e))
            },
            done,
        );
    }

    fn remove(&self, path: &str, done: Completion<()>) {
        let full = match self.resolve_path(path) {
            Ok(full) => full,
            Err(e) => return done(Err(e)),
        };
        trace!(path = %full.display(), "remove");
        scheduler::spawn_with_completion(
            async move {
                tokio::fs::remove_file(&full)
                    .await
                    .map_err(|e| ProviderError::io(full.display().to_string(), e))
            },
            done,
        );
    }

    fn stat(&self, path: &str, done: Completion<StatResult>) {
        let full = match self.resolve_path(path) {
            Ok(full) => full,
            Err(e) => return done(Err(e)),
        };
        trace!(path = %full.display(), "stat");
        scheduler::spawn_with_completion(
            async move {
                match tokio::fs::metadata(&full).await {
                    Ok(metadata) => {
                        let last_modified = metadata
                            .modified()
                            .ok()
                            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                            .map(|elapsed| elapsed.as_millis() as i64)
                            .unwrap_or(0);
                        Ok(StatResult {
                            exists: true,
                            is_directory: metadata.is_dir(),
                            is_file: metadata.is_file(),
                            last_modified,
                        })
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatResult::default()),
                    Err(e) => Err(ProviderError::io(full.display().to_string(), e)),
                }
            },
            done,
        );
    }

    fn resolve(&self, path: &str) -> ProviderResult<String> {
        Ok(self.resolve_path(path)?.display().to_string())
    }
}
