//! Flashcard records

use std::collections::BTreeSet;

use crate::note::NoteId;

/// Where a candidate came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub note: NoteId,
    pub chunk_index: usize,
}

impl Provenance {
    pub fn new(note: NoteId, chunk_index: usize) -> Self {
        Self { note, chunk_index }
    }
}

/// A card as read from a backend reply, before validation and dedup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardCandidate {
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
    pub provenance: Provenance,
}

/// A validated, deduplicated card ready for export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    front: String,
    back: String,
    tags: BTreeSet<String>,
}

impl Flashcard {
    /// Returns `None` when front or back is blank after trimming.
    pub fn new<I, S>(front: &str, back: &str, tags: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let front = front.trim();
        let back = back.trim();
        if front.is_empty() || back.is_empty() {
            return None;
        }

        Some(Self {
            front: front.to_string(),
            back: back.to_string(),
            tags: tags
                .into_iter()
                .filter_map(|t| sanitize_tag(t.as_ref()))
                .collect(),
        })
    }

    pub fn front(&self) -> &str {
        &self.front
    }

    pub fn back(&self) -> &str {
        &self.back
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Tags joined with spaces, the form Anki expects in its tags column
    pub fn tag_field(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    pub fn dedup_key(&self) -> String {
        dedup_key(&self.front, &self.back)
    }
}

fn collapse_lowercase(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case- and whitespace-insensitive identity of a card
pub fn dedup_key(front: &str, back: &str) -> String {
    format!(
        "{}\u{1f}{}",
        collapse_lowercase(front),
        collapse_lowercase(back)
    )
}

/// Make `raw` usable as a single Anki tag.
///
/// Leading `#` is dropped, inner whitespace becomes `_`, and characters that
/// would confuse the delimited export are removed. Blank input yields `None`.
pub fn sanitize_tag(raw: &str) -> Option<String> {
    let tag = raw
        .trim()
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace([';', ',', '"'], "");
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_sides_are_rejected() {
        assert!(Flashcard::new("  ", "answer", Vec::<String>::new()).is_none());
        assert!(Flashcard::new("question", "\n\t", Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_sides_are_trimmed() {
        let card = Flashcard::new("  What is ATP? ", " Energy currency\n", ["bio"]).unwrap();
        assert_eq!(card.front(), "What is ATP?");
        assert_eq!(card.back(), "Energy currency");
    }

    #[test]
    fn test_dedup_key_ignores_case_and_whitespace() {
        assert_eq!(
            dedup_key("What is  ATP?", "Energy\ncurrency"),
            dedup_key("what is atp?", "  energy currency ")
        );
        assert_ne!(dedup_key("a b", "c"), dedup_key("a", "b c"));
    }

    #[test]
    fn test_tags_are_sanitized_and_sorted() {
        let card = Flashcard::new("Q", "A", ["#zoology", "cell biology", " ", "a;b"]).unwrap();
        assert_eq!(card.tag_field(), "ab cell_biology zoology");
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("#Rome"), Some("Rome".to_string()));
        assert_eq!(sanitize_tag("  "), None);
        assert_eq!(sanitize_tag("\"quoted\""), Some("quoted".to_string()));
    }
}
