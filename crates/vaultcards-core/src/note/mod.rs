//! Note model
//!
//! A note is one Markdown file from the vault. It is built once from its
//! path and raw text, and is read-only afterwards: the cleaned text, the
//! detected language and the tags collected from front-matter and inline
//! `#tags` are all computed at construction.

pub mod frontmatter;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::text::language::{detect_language, Detection};
use crate::text::normalize;

/// Identifier used to tag cards with their source note.
///
/// Derived from the file stem with whitespace replaced by `_`, so it is a
/// valid single Anki tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(String);

impl NoteId {
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "note".to_string());
        Self::new(&stem)
    }

    pub fn new(name: &str) -> Self {
        let id = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        if id.is_empty() {
            NoteId("note".to_string())
        } else {
            NoteId(id)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Markdown note ready for chunking
#[derive(Debug, Clone)]
pub struct Note {
    path: PathBuf,
    id: NoteId,
    clean: String,
    language: Detection,
    tags: Vec<String>,
}

impl Note {
    /// Build a note from its source. Never fails: text that cleans down to
    /// nothing simply yields an empty note that the content gate skips.
    pub fn new(path: impl Into<PathBuf>, raw: impl Into<String>) -> Self {
        let path = path.into();
        let raw = raw.into();
        let id = NoteId::from_path(&path);

        let (yaml, body) = frontmatter::split_frontmatter(&raw);
        let mut tags = yaml.map(frontmatter::frontmatter_tags).unwrap_or_default();
        for tag in frontmatter::inline_tags(body) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let clean = normalize(&raw);
        let language = detect_language(&clean);

        Self {
            path,
            id,
            clean,
            language,
            tags,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> &NoteId {
        &self.id
    }

    /// File name shown in prompts and progress output
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Normalized prose sent to the generation backend
    pub fn clean_text(&self) -> &str {
        &self.clean
    }

    /// Detected language name, or `fallback` when detection was inconclusive
    pub fn language_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match &self.language {
            Detection::Detected(language) => language.name(),
            Detection::Inconclusive => fallback,
        }
    }

    /// Tags from front-matter and inline `#tags`
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
