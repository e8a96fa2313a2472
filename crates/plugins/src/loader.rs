//! Handles through which plugins read the files their configuration names.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use strata_core::{Error, Result};
use tracing::debug;

/// Reads files relative to a root directory.
pub trait Loader: Send + Sync {
    fn root(&self) -> &Path;

    fn load(&self, path: &str) -> Result<Vec<u8>>;

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() { p.to_path_buf() } else { self.root().join(p) }
    }
}

/// Loader over the local filesystem.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }
}

impl Loader for FsLoader {
    fn root(&self) -> &Path { &self.root }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        debug!(path = %full.display(), "loading file");
        std::fs::read(&full).map_err(|e| Error::Load { path: full.display().to_string(), reason: e.to_string() })
    }
}

/// In-memory loader, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemLoader {
    root: PathBuf,
    files: FxHashMap<PathBuf, Vec<u8>>,
}

impl MemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), files: FxHashMap::default() }
    }

    /// Add a file; relative paths are taken from the root.
    pub fn add_file(&mut self, path: &str, content: impl Into<Vec<u8>>) -> &mut Self {
        let full = self.resolve(path);
        self.files.insert(full, content.into());
        self
    }
}

impl Loader for MemLoader {
    fn root(&self) -> &Path { &self.root }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        self.files
            .get(&full)
            .cloned()
            .ok_or_else(|| Error::Load { path: full.display().to_string(), reason: "no such file".into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_loader_resolves_against_root() {
        let mut l = MemLoader::new("/app");
        l.add_file("a.env", "A=1").add_file("/abs/b.txt", "b");
        assert_eq!(l.load("a.env").unwrap(), b"A=1");
        assert_eq!(l.load("/app/a.env").unwrap(), b"A=1");
        assert_eq!(l.load("/abs/b.txt").unwrap(), b"b");
        let err = l.load("missing").unwrap_err().to_string();
        assert!(err.contains("/app/missing"), "err={err}");
    }

    #[test]
    fn fs_loader_reports_missing_files() {
        let l = FsLoader::new("/definitely/not/here");
        assert!(matches!(l.load("x.yaml"), Err(Error::Load { .. })));
    }
}
