//! Corpus scanner.
//!
//! Walks the corpus root and produces one [`SourceFile`] per readable
//! regular file, tagging each with the basename of its immediate parent
//! directory as its access group. The expected layout is one
//! subdirectory per access group with files directly inside; deeper
//! nesting still works, the nearest parent wins.
//!
//! A missing root is fatal. An unreadable file is logged and skipped; it
//! must never abort the scan. A root that exists but yields zero
//! readable files is its own distinct error so callers can report
//! "nothing to do" instead of a failure.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use raggate_core::models::SourceFile;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("no readable files under corpus root: {0}")]
    Empty(PathBuf),
}

/// Scan the corpus root into source files, sorted by path for
/// deterministic ingestion order.
pub fn scan_corpus(root: &Path) -> Result<Vec<SourceFile>, CorpusError> {
    if !root.is_dir() {
        return Err(CorpusError::RootNotFound(root.to_path_buf()));
    }

    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root) {
        match entry {
            Ok(e) if e.file_type().is_file() => entries.push(e.into_path()),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
            }
        }
    }
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };

        // Files directly under the root inherit the root's own basename
        // as their group, matching the one-subdirectory-per-group layout.
        let access_group = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        files.push(SourceFile {
            file_name,
            access_group,
            body,
        });
    }

    if files.is_empty() {
        return Err(CorpusError::Empty(root.to_path_buf()));
    }

    Ok(files)
}
