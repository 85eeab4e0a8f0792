//! Directory traversal for candidate media files

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Walks a directory tree and yields supported, non-empty files.
///
/// Each call to [`FileEnumerator::iter`] starts a fresh walk, sorted by file
/// name, so repeated walks of an unchanged tree produce the same sequence.
/// Symbolic links are not followed.
#[derive(Debug, Clone)]
pub struct FileEnumerator {
    root: PathBuf,
    extensions: BTreeSet<String>,
}

impl FileEnumerator {
    /// Create an enumerator rooted at `root`, which must exist
    pub fn new(root: &Path, extensions: BTreeSet<String>) -> Result<Self> {
        let root = fs::canonicalize(root).map_err(|e| Error::from_io(root, e))?;
        if !root.is_dir() {
            return Err(Error::NotFound { path: root });
        }

        let extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        Ok(Self { root, extensions })
    }

    /// Absolute root of the walk
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.is_allowed(entry.path()))
            .filter(|entry| match entry.metadata() {
                Ok(metadata) => metadata.len() > 0,
                Err(e) => {
                    debug!(path = ?entry.path(), error = %e, "Cannot stat file, skipping");
                    false
                }
            })
            .map(|entry| entry.into_path())
    }

    /// Collect the whole walk
    pub fn collect_paths(&self) -> Vec<PathBuf> {
        self.iter().collect()
    }

    fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}
