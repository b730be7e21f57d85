//! Markdown discovery under a vault root

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, VaultcardsError};

/// A discovered note file and its raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSource {
    pub path: PathBuf,
    pub raw: String,
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// True when the path below `root` contains any pattern, case-insensitively
fn is_ignored(root: &Path, path: &Path, patterns: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.to_string_lossy().to_lowercase();
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .any(|p| relative.contains(&p.to_lowercase()))
}

/// List Markdown files under `root` in a stable order.
///
/// Ignored directories are not descended into. Entries that cannot be read
/// are logged and skipped.
pub fn discover(
    root: &Path,
    ignore_patterns: &[String],
    max_files: Option<usize>,
) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(VaultcardsError::VaultNotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(VaultcardsError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_ignored(root, entry.path(), ignore_patterns));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable vault entry");
                continue;
            }
        };

        if entry.file_type().is_file() && is_markdown(entry.path()) {
            files.push(entry.into_path());
            if max_files.is_some_and(|max| files.len() >= max) {
                debug!(max = ?max_files, "file limit reached");
                break;
            }
        }
    }

    debug!(root = %root.display(), files = files.len(), "discovered notes");
    Ok(files)
}

/// Read each file; unreadable or non-UTF-8 files are logged and skipped
pub fn load(paths: Vec<PathBuf>) -> Vec<NoteSource> {
    paths
        .into_iter()
        .filter_map(|path| match fs::read_to_string(&path) {
            Ok(raw) => Some(NoteSource { path, raw }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read note");
                None
            }
        })
        .collect()
}
