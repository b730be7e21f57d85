//! Aggregator
//!
//! Collects candidates from every chunk of every note into one card set.
//! The first card seen for a dedup key wins; later duplicates are counted
//! and dropped. Each kept card is tagged with its candidate tags, the source
//! note id, the note's language, the note's own tags and the run's base tags.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::card::{Flashcard, FlashcardCandidate};
use crate::note::NoteId;

/// Per-note facts the aggregator tags cards with
#[derive(Debug, Clone, Default)]
pub struct NoteTags {
    pub language: String,
    pub tags: Vec<String>,
}

/// Run-wide dedup set
#[derive(Debug, Default)]
pub struct Aggregator {
    base_tags: Vec<String>,
    seen: HashSet<String>,
    cards: Vec<Flashcard>,
    duplicates: usize,
    rejected: usize,
}

impl Aggregator {
    pub fn new(base_tags: Vec<String>) -> Self {
        Self {
            base_tags,
            ..Self::default()
        }
    }

    /// Add one candidate; returns true when it became a new card
    pub fn add(&mut self, candidate: FlashcardCandidate, note: &NoteTags) -> bool {
        let FlashcardCandidate {
            front,
            back,
            tags,
            provenance,
        } = candidate;

        let all_tags = tags
            .into_iter()
            .chain(std::iter::once(provenance.note.to_string()))
            .chain(std::iter::once(note.language.clone()))
            .chain(note.tags.iter().cloned())
            .chain(self.base_tags.iter().cloned());

        let Some(card) = Flashcard::new(&front, &back, all_tags) else {
            self.rejected += 1;
            debug!(
                note = %provenance.note,
                chunk = provenance.chunk_index,
                "dropping card with an empty side"
            );
            return false;
        };

        if !self.seen.insert(card.dedup_key()) {
            self.duplicates += 1;
            debug!(note = %provenance.note, front = card.front(), "dropping duplicate card");
            return false;
        }

        self.cards.push(card);
        true
    }

    pub fn extend<I>(&mut self, candidates: I, note: &NoteTags) -> usize
    where
        I: IntoIterator<Item = FlashcardCandidate>,
    {
        let mut added = 0;
        for candidate in candidates {
            if self.add(candidate, note) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Candidates dropped because front or back was blank
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn into_cards(self) -> Vec<Flashcard> {
        self.cards
    }
}

/// Aggregate candidates from all chunks and notes in one pass.
///
/// `notes` maps each note to its language and tags; candidates from notes
/// missing from the map get only their own tags and the note id.
pub fn aggregate<I>(candidates: I, notes: &HashMap<NoteId, NoteTags>) -> Vec<Flashcard>
where
    I: IntoIterator<Item = FlashcardCandidate>,
{
    let mut aggregator = Aggregator::default();
    let untagged = NoteTags::default();
    for candidate in candidates {
        let note = notes.get(&candidate.provenance.note).unwrap_or(&untagged);
        aggregator.add(candidate, note);
    }
    aggregator.into_cards()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Provenance;

    fn candidate(front: &str, back: &str, note: &str, tags: &[&str]) -> FlashcardCandidate {
        FlashcardCandidate {
            front: front.to_string(),
            back: back.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            provenance: Provenance::new(NoteId::new(note), 0),
        }
    }

    fn english() -> NoteTags {
        NoteTags {
            language: "English".to_string(),
            tags: vec!["history".to_string()],
        }
    }

    #[test]
    fn test_duplicates_differing_in_case_and_space_collapse() {
        let mut aggregator = Aggregator::new(vec![]);
        assert!(aggregator.add(candidate("What is ATP?", "Energy", "Cells", &[]), &english()));
        assert!(!aggregator.add(candidate("what  is atp?", " energy ", "Cells", &[]), &english()));

        assert_eq!(aggregator.len(), 1);
        assert_eq!(aggregator.duplicates(), 1);
    }

    #[test]
    fn test_first_seen_wins() {
        let mut aggregator = Aggregator::new(vec![]);
        aggregator.add(candidate("Q", "A", "First", &["one"]), &english());
        aggregator.add(candidate("q", "a", "Second", &["two"]), &english());

        let cards = aggregator.into_cards();
        assert_eq!(cards.len(), 1);
        assert!(cards[0].tags().contains("First"));
        assert!(!cards[0].tags().contains("Second"));
    }

    #[test]
    fn test_tags_include_note_language_and_base() {
        let mut aggregator = Aggregator::new(vec!["obsidian".to_string()]);
        aggregator.add(candidate("Q", "A", "Ancient Rome", &["geography"]), &english());

        let cards = aggregator.into_cards();
        let tags = cards[0].tags();
        for expected in ["geography", "Ancient_Rome", "English", "history", "obsidian"] {
            assert!(tags.contains(expected), "missing tag {}", expected);
        }
    }

    #[test]
    fn test_blank_candidates_are_rejected() {
        let mut aggregator = Aggregator::new(vec![]);
        assert!(!aggregator.add(candidate(" ", "A", "n", &[]), &english()));
        assert_eq!(aggregator.rejected(), 1);
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_aggregate_free_function() {
        let mut notes = HashMap::new();
        notes.insert(NoteId::new("Cells"), english());

        let cards = aggregate(
            vec![
                candidate("What is ATP?", "Energy", "Cells", &[]),
                candidate("WHAT IS ATP?", "energy", "Cells", &[]),
                candidate("What is DNA?", "Genes", "Unknown", &[]),
            ],
            &notes,
        );

        assert_eq!(cards.len(), 2);
        assert!(cards[0].tags().contains("English"));
        assert!(cards[1].tags().contains("Unknown"));
    }
}
