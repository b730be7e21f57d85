//! Splitting cleaned note text into model-sized chunks
//!
//! Chunks are disjoint slices of the input: concatenating them in order
//! gives back the input exactly. A text of at most `max_chars` characters is
//! a single chunk. Longer text is cut near every `max_chars` mark, preferring
//! (in order) a paragraph break, a sentence end, a line break, then any
//! whitespace, searched within `look_back` characters on either side of the
//! mark; the candidate nearest the mark wins within the best tier. With no
//! boundary in the window the cut is made at exactly `max_chars`. No chunk
//! is therefore longer than `max_chars + look_back` characters.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use crate::error::{Result, VaultcardsError};
use crate::text::cached_regex;

fn boundary_tiers() -> [Option<&'static Regex>; 4] {
    static PARAGRAPH: OnceLock<Option<Regex>> = OnceLock::new();
    static SENTENCE: OnceLock<Option<Regex>> = OnceLock::new();
    static LINE: OnceLock<Option<Regex>> = OnceLock::new();
    static SPACE: OnceLock<Option<Regex>> = OnceLock::new();
    [
        cached_regex(&PARAGRAPH, r"\n[ \t]*\n\s*"),
        cached_regex(&SENTENCE, r#"[.!?]["')\]]*\s+"#),
        cached_regex(&LINE, r"\n"),
        cached_regex(&SPACE, r"\s+"),
    ]
}

/// One slice of a note's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Position in the sequence, starting at 0
    pub index: usize,
    /// Byte range within the chunked text
    pub span: Range<usize>,
    pub text: &'a str,
}

impl Chunk<'_> {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Chunking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
    look_back: usize,
}

impl Chunker {
    /// `look_back` is clamped below `max_chars` so every cut makes progress
    pub fn new(max_chars: usize, look_back: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            look_back: look_back.min(max_chars - 1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn look_back(&self) -> usize {
        self.look_back
    }

    /// Lazily iterate over the chunks of `text`.
    ///
    /// The iterator is `Clone`; calling `chunks` again restarts from the top.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            pos: 0,
            index: 0,
            finished: false,
            chunker: *self,
        }
    }

    /// Byte offset where the chunk starting at `rest` should end
    fn cut_point(&self, rest: &str) -> usize {
        let offset_of = |n: usize| {
            rest.char_indices()
                .nth(n)
                .map(|(i, _)| i)
                .unwrap_or(rest.len())
        };

        let target = offset_of(self.max_chars);
        let lo = offset_of(self.max_chars - self.look_back);
        let hi = offset_of(self.max_chars + self.look_back);
        let window = &rest[lo..hi];

        for re in boundary_tiers().into_iter().flatten() {
            let best = re
                .find_iter(window)
                .map(|m| lo + m.end())
                .filter(|&cut| cut > 0 && cut <= hi)
                .min_by_key(|&cut| cut.abs_diff(target));
            if let Some(cut) = best {
                return cut;
            }
        }

        target
    }
}

/// Lazy, finite, restartable chunk sequence
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    pos: usize,
    index: usize,
    finished: bool,
    chunker: Chunker,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let rest = &self.text[self.pos..];
        let end = if rest.chars().count() <= self.chunker.max_chars {
            self.finished = true;
            self.text.len()
        } else {
            self.pos + self.chunker.cut_point(rest)
        };

        let chunk = Chunk {
            index: self.index,
            span: self.pos..end,
            text: &self.text[self.pos..end],
        };

        self.pos = end;
        self.index += 1;
        if self.pos >= self.text.len() {
            self.finished = true;
        }

        Some(chunk)
    }
}

/// Convenience wrapper returning owned chunk texts
pub fn chunk(text: &str, max_chars: usize, look_back: usize) -> Vec<String> {
    Chunker::new(max_chars, look_back)
        .chunks(text)
        .map(|c| c.text.to_string())
        .collect()
}

/// Check that `chunks` tile `text` exactly, in order.
///
/// A failure here is an internal bug, reported as
/// [`VaultcardsError::ChunkingInvariant`].
pub fn verify_coverage(note: &str, text: &str, chunks: &[Chunk<'_>]) -> Result<()> {
    let mut expected_start = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.index != i || chunk.span.start != expected_start {
            return Err(VaultcardsError::ChunkingInvariant {
                note: note.to_string(),
                reason: format!(
                    "chunk {} starts at byte {} (expected {})",
                    chunk.index, chunk.span.start, expected_start
                ),
            });
        }
        expected_start = chunk.span.end;
    }

    if expected_start != text.len() {
        return Err(VaultcardsError::ChunkingInvariant {
            note: note.to_string(),
            reason: format!(
                "chunks cover {} of {} bytes",
                expected_start,
                text.len()
            ),
        });
    }

    Ok(())
}
