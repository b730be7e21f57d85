//! End-of-run summary

use std::path::PathBuf;

use crate::error::BackendError;

/// Why a note produced no generation calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Cleaned text below the minimum content threshold
    TooShort { chars: usize, minimum: usize },
    /// The run stopped before the note was reached
    NotReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNote {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// A chunk whose generation failed after retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub path: PathBuf,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub error: BackendError,
}

/// How a run that produced cards (or not) should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// At least one card was generated
    Cards(usize),
    /// No cards because nothing was worth generating from
    EmptyContent,
    /// No cards and at least one generation call failed
    BackendFailure,
}

/// Counters and failures for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub notes_total: usize,
    pub notes_processed: usize,
    pub skipped: Vec<SkippedNote>,
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
    pub chunks_not_attempted: usize,
    pub failures: Vec<ChunkFailure>,
    /// Retries across all successful generations
    pub retries: u32,
    pub candidates: usize,
    pub cards: usize,
    pub duplicates: usize,
    pub rejected: usize,
    /// Stopped by the cancel flag
    pub cancelled: bool,
    /// Stopped by a backend configuration error (4xx)
    pub aborted: Option<BackendError>,
}

impl RunSummary {
    pub fn notes_skipped(&self) -> usize {
        self.skipped.len()
    }

    pub fn chunks_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn verdict(&self) -> Verdict {
        if self.cards > 0 {
            Verdict::Cards(self.cards)
        } else if !self.failures.is_empty() || self.aborted.is_some() {
            Verdict::BackendFailure
        } else {
            Verdict::EmptyContent
        }
    }

    /// True when the run stopped early
    pub fn is_partial(&self) -> bool {
        self.cancelled || self.aborted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use crate::error::BackendErrorKind;

    #[test]
    fn test_verdict_distinguishes_empty_from_failure() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.verdict(), Verdict::EmptyContent);

        summary.failures.push(ChunkFailure {
            path: PathBuf::from("a.md"),
            chunk_index: 0,
            chunk_count: 1,
            error: BackendError::new(Provider::Ollama, BackendErrorKind::Timeout),
        });
        assert_eq!(summary.verdict(), Verdict::BackendFailure);
        assert_eq!(summary.chunks_failed(), 1);

        summary.cards = 4;
        assert_eq!(summary.verdict(), Verdict::Cards(4));
    }
}
