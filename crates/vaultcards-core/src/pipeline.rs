//! Pipeline orchestration
//!
//! Notes are cleaned, gated on content length and chunked up front. Chunks
//! are then sent to the backend either one at a time in note order, or by a
//! small pool of worker threads pulling from a shared queue. Either way a
//! single loop owns the [`Aggregator`] and the [`RunSummary`] and consumes
//! one result per chunk, so a failed chunk is recorded and never stops its
//! siblings.
//!
//! The run stops early when the cancel flag is raised or when the backend
//! rejects a request as misconfigured (4xx). Cards aggregated before the
//! stop are still returned.

use std::collections::VecDeque;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregate::{Aggregator, NoteTags};
use crate::backend::{GenerationBackend, GenerationRequest};
use crate::card::{Flashcard, FlashcardCandidate, Provenance};
use crate::chunk::{verify_coverage, Chunker};
use crate::config::GenerationConfig;
use crate::error::{BackendError, Result};
use crate::note::Note;
use crate::parse::parse;
use crate::prompt::{build_prompt, PromptContext};
use crate::summary::{ChunkFailure, RunSummary, SkipReason, SkippedNote};
use crate::text::meaningful_len;
use crate::trace_time;
use crate::vault::NoteSource;

/// Progress notifications for user-facing output
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    NoteStarted {
        /// 1-based position among all notes
        position: usize,
        total: usize,
        path: &'a Path,
        chunks: usize,
    },
    NoteSkipped {
        position: usize,
        total: usize,
        path: &'a Path,
        reason: &'a SkipReason,
    },
    ChunkFinished {
        path: &'a Path,
        chunk_index: usize,
        chunk_count: usize,
        new_cards: usize,
    },
    ChunkFailed {
        path: &'a Path,
        chunk_index: usize,
        chunk_count: usize,
        error: &'a BackendError,
    },
}

/// Callback receiving [`ProgressEvent`]s
pub type ProgressFn<'a> = dyn Fn(&ProgressEvent<'_>) + Sync + 'a;

/// Cards and counters from one run
#[derive(Debug)]
pub struct RunReport {
    pub cards: Vec<Flashcard>,
    pub summary: RunSummary,
}

enum Plan {
    Skip(SkipReason),
    Generate(Vec<Range<usize>>),
}

struct NotePlan {
    position: usize,
    note: Note,
    tags: NoteTags,
    plan: Plan,
}

impl NotePlan {
    fn chunk_count(&self) -> usize {
        match &self.plan {
            Plan::Skip(_) => 0,
            Plan::Generate(spans) => spans.len(),
        }
    }
}

struct ChunkJob<'p> {
    note_idx: usize,
    plan: &'p NotePlan,
    chunk_index: usize,
    span: Range<usize>,
}

struct ChunkOutcome {
    note_idx: usize,
    chunk_index: usize,
    result: std::result::Result<(Vec<FlashcardCandidate>, u32), BackendError>,
}

/// Aggregation state owned by the consuming loop
struct RunState {
    aggregator: Aggregator,
    summary: RunSummary,
}

pub struct Pipeline<'a> {
    backend: &'a dyn GenerationBackend,
    config: &'a GenerationConfig,
    cancel: Arc<AtomicBool>,
    halt: AtomicBool,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(backend: &'a dyn GenerationBackend, config: &'a GenerationConfig) -> Self {
        Self {
            backend,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            halt: AtomicBool::new(false),
            progress: None,
        }
    }

    /// Share an externally owned stop flag (e.g. set from a Ctrl-C handler)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn emit(&self, event: ProgressEvent<'_>) {
        if let Some(progress) = self.progress {
            progress(&event);
        }
    }

    fn should_stop(&self) -> bool {
        self.cancel.load(Ordering::SeqCst) || self.halt.load(Ordering::SeqCst)
    }

    /// Run every note through generation and aggregation.
    ///
    /// Only a chunking invariant violation fails the run; backend failures
    /// are recorded in the summary.
    pub fn run(&self, sources: Vec<NoteSource>) -> Result<RunReport> {
        let start = Instant::now();
        let plans = self.plan(sources)?;
        trace_time!(start, "plan");

        let mut state = RunState {
            aggregator: Aggregator::new(self.config.base_tags.clone()),
            summary: RunSummary {
                notes_total: plans.len(),
                chunks_total: plans.iter().map(NotePlan::chunk_count).sum(),
                ..RunSummary::default()
            },
        };

        let workers = self.config.concurrency.max(1);
        if workers == 1 {
            self.run_sequential(&plans, &mut state);
        } else {
            self.run_pooled(&plans, &mut state, workers);
        }

        let RunState {
            aggregator,
            mut summary,
        } = state;
        summary.cards = aggregator.len();
        summary.duplicates = aggregator.duplicates();
        summary.rejected = aggregator.rejected();
        summary.cancelled = self.cancel.load(Ordering::SeqCst);

        info!(
            notes = summary.notes_total,
            processed = summary.notes_processed,
            skipped = summary.notes_skipped(),
            chunks_failed = summary.chunks_failed(),
            cards = summary.cards,
            "run finished"
        );
        trace_time!(start, "run");

        Ok(RunReport {
            cards: aggregator.into_cards(),
            summary,
        })
    }

    /// Clean, gate and chunk every note
    fn plan(&self, sources: Vec<NoteSource>) -> Result<Vec<NotePlan>> {
        let chunker = Chunker::new(self.config.max_chunk_size, self.config.look_back);
        let minimum = self.config.min_content_chars;

        let mut plans = Vec::with_capacity(sources.len());
        for (i, source) in sources.into_iter().enumerate() {
            let note = Note::new(source.path, source.raw);
            let text = note.clean_text();
            let chars = text.chars().count().min(meaningful_len(text));

            let plan = if chars < minimum {
                debug!(note = %note.id(), chars, minimum, "note below content threshold");
                Plan::Skip(SkipReason::TooShort { chars, minimum })
            } else {
                let chunks: Vec<_> = chunker.chunks(text).collect();
                verify_coverage(note.id().as_str(), text, &chunks)?;
                debug!(note = %note.id(), chunks = chunks.len(), "chunked note");
                Plan::Generate(chunks.into_iter().map(|c| c.span).collect())
            };

            let tags = NoteTags {
                language: note.language_or(&self.config.default_language).to_string(),
                tags: note.tags().to_vec(),
            };
            plans.push(NotePlan {
                position: i + 1,
                note,
                tags,
                plan,
            });
        }
        Ok(plans)
    }

    /// Announce a note; returns the chunk spans to generate, if any
    fn begin_note<'p>(
        &self,
        plan: &'p NotePlan,
        total: usize,
        summary: &mut RunSummary,
    ) -> Option<&'p [Range<usize>]> {
        match &plan.plan {
            Plan::Skip(reason) => {
                self.skip_note(plan, reason, total, summary);
                None
            }
            Plan::Generate(spans) => {
                self.start_note(plan, total, summary);
                Some(spans)
            }
        }
    }

    fn skip_note(
        &self,
        plan: &NotePlan,
        reason: &SkipReason,
        total: usize,
        summary: &mut RunSummary,
    ) {
        let path = plan.note.path();
        self.emit(ProgressEvent::NoteSkipped {
            position: plan.position,
            total,
            path,
            reason,
        });
        summary.skipped.push(SkippedNote {
            path: path.to_path_buf(),
            reason: reason.clone(),
        });
    }

    fn start_note(&self, plan: &NotePlan, total: usize, summary: &mut RunSummary) {
        let chunks = plan.chunk_count();
        info!(
            note = %plan.note.id(),
            chunks,
            language = %plan.tags.language,
            "processing note"
        );
        self.emit(ProgressEvent::NoteStarted {
            position: plan.position,
            total,
            path: plan.note.path(),
            chunks,
        });
        summary.notes_processed += 1;
    }

    /// Record notes never reached because the run stopped
    fn mark_not_reached(&self, plans: &[NotePlan], summary: &mut RunSummary) {
        for plan in plans {
            let reason = match &plan.plan {
                Plan::Skip(reason) => reason.clone(),
                Plan::Generate(spans) => {
                    summary.chunks_not_attempted += spans.len();
                    SkipReason::NotReached
                }
            };
            summary.skipped.push(SkippedNote {
                path: plan.note.path().to_path_buf(),
                reason,
            });
        }
    }

    fn run_sequential(&self, plans: &[NotePlan], state: &mut RunState) {
        let total = plans.len();
        for (note_idx, plan) in plans.iter().enumerate() {
            if self.should_stop() {
                self.mark_not_reached(&plans[note_idx..], &mut state.summary);
                return;
            }

            let Some(spans) = self.begin_note(plan, total, &mut state.summary) else {
                continue;
            };

            for (chunk_index, span) in spans.iter().enumerate() {
                if self.should_stop() {
                    state.summary.chunks_not_attempted += spans.len() - chunk_index;
                    break;
                }
                let outcome = self.process(&ChunkJob {
                    note_idx,
                    plan,
                    chunk_index,
                    span: span.clone(),
                });
                self.record(plans, state, outcome);
            }
        }
    }

    /// Notes count as processed once their first chunk result arrives;
    /// notes with no chunk sent before a stop are recorded as not reached.
    fn run_pooled(&self, plans: &[NotePlan], state: &mut RunState, workers: usize) {
        let total = plans.len();
        let mut jobs = VecDeque::new();
        for (note_idx, plan) in plans.iter().enumerate() {
            match &plan.plan {
                Plan::Skip(reason) => self.skip_note(plan, reason, total, &mut state.summary),
                Plan::Generate(spans) => {
                    jobs.extend(spans.iter().enumerate().map(|(chunk_index, span)| ChunkJob {
                        note_idx,
                        plan,
                        chunk_index,
                        span: span.clone(),
                    }));
                }
            }
        }

        let workers = workers.min(jobs.len());
        debug!(workers, jobs = jobs.len(), "starting worker pool");
        let queue = Mutex::new(jobs);
        let (tx, rx) = mpsc::channel::<ChunkOutcome>();
        let mut started = vec![false; plans.len()];

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || loop {
                    if self.should_stop() {
                        break;
                    }
                    let job = match queue.lock() {
                        Ok(mut queue) => queue.pop_front(),
                        Err(_) => None,
                    };
                    let Some(job) = job else {
                        break;
                    };
                    if tx.send(self.process(&job)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                if !started[outcome.note_idx] {
                    started[outcome.note_idx] = true;
                    self.start_note(&plans[outcome.note_idx], total, &mut state.summary);
                }
                self.record(plans, state, outcome);
            }
        });

        state.summary.chunks_not_attempted += queue.into_inner().map(|q| q.len()).unwrap_or(0);

        for (plan, _) in plans
            .iter()
            .zip(&started)
            .filter(|(plan, seen)| !**seen && matches!(plan.plan, Plan::Generate(_)))
        {
            state.summary.skipped.push(SkippedNote {
                path: plan.note.path().to_path_buf(),
                reason: SkipReason::NotReached,
            });
        }
    }

    /// Generate and parse one chunk. Never panics or propagates: the result
    /// travels back to the consuming loop.
    fn process(&self, job: &ChunkJob<'_>) -> ChunkOutcome {
        let note = &job.plan.note;
        let chunk_count = job.plan.chunk_count();
        let file_name = note.file_name();
        let context = PromptContext {
            file_name: &file_name,
            part: Some((job.chunk_index + 1, chunk_count)),
            language: &job.plan.tags.language,
        };
        let text = &note.clean_text()[job.span.clone()];
        let request = GenerationRequest {
            prompt: build_prompt(&context, text),
            source: context.source_label(),
        };

        let start = Instant::now();
        let result = self.backend.generate(&request).map(|response| {
            let provenance = Provenance::new(note.id().clone(), job.chunk_index);
            let candidates = parse(&response.text, &provenance);
            if candidates.is_empty() {
                debug!(source = %request.source, "reply held no usable cards");
            }
            (candidates, response.attempts)
        });
        trace_time!(start, "generate", chunk = job.chunk_index);

        ChunkOutcome {
            note_idx: job.note_idx,
            chunk_index: job.chunk_index,
            result,
        }
    }

    fn record(&self, plans: &[NotePlan], state: &mut RunState, outcome: ChunkOutcome) {
        let plan = &plans[outcome.note_idx];
        let path = plan.note.path();
        let chunk_count = plan.chunk_count();

        match outcome.result {
            Ok((candidates, attempts)) => {
                let summary = &mut state.summary;
                summary.chunks_succeeded += 1;
                summary.retries += attempts.saturating_sub(1);
                summary.candidates += candidates.len();

                let new_cards = state.aggregator.extend(candidates, &plan.tags);
                self.emit(ProgressEvent::ChunkFinished {
                    path,
                    chunk_index: outcome.chunk_index,
                    chunk_count,
                    new_cards,
                });
            }
            Err(error) => {
                warn!(
                    note = %plan.note.id(),
                    chunk = outcome.chunk_index + 1,
                    chunks = chunk_count,
                    error = %error,
                    "Chunk generation failed"
                );
                self.emit(ProgressEvent::ChunkFailed {
                    path,
                    chunk_index: outcome.chunk_index,
                    chunk_count,
                    error: &error,
                });

                if error.is_configuration_error() && state.summary.aborted.is_none() {
                    warn!(error = %error, "Backend rejected the request, stopping the run");
                    self.halt.store(true, Ordering::SeqCst);
                    state.summary.aborted = Some(error.clone());
                }

                state.summary.failures.push(ChunkFailure {
                    path: path.to_path_buf(),
                    chunk_index: outcome.chunk_index,
                    chunk_count,
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationResponse;
    use crate::config::Provider;
    use crate::error::BackendErrorKind;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    const LONG_NOTE: &str = "Photosynthesis is the process by which green plants turn light into chemical energy. \
        It takes place in the chloroplasts and releases oxygen as a by-product of splitting water.";

    struct ScriptedBackend {
        calls: AtomicUsize,
        reply: fn(usize) -> std::result::Result<String, BackendErrorKind>,
    }

    impl ScriptedBackend {
        fn new(reply: fn(usize) -> std::result::Result<String, BackendErrorKind>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply,
            }
        }
    }

    impl GenerationBackend for ScriptedBackend {
        fn provider(&self) -> Provider {
            Provider::Ollama
        }

        fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<GenerationResponse, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)(call)
                .map(|text| GenerationResponse { text, attempts: 1 })
                .map_err(|kind| BackendError::new(Provider::Ollama, kind))
        }
    }

    fn source(name: &str, raw: &str) -> NoteSource {
        NoteSource {
            path: PathBuf::from(name),
            raw: raw.to_string(),
        }
    }

    #[test]
    fn test_cards_flow_through_to_report() {
        let backend = ScriptedBackend::new(|_| {
            Ok("What is photosynthesis? | Turning light into chemical energy | biology".to_string())
        });
        let config = GenerationConfig::default();
        let report = Pipeline::new(&backend, &config)
            .run(vec![source("Plants.md", LONG_NOTE)])
            .unwrap();

        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.summary.notes_processed, 1);
        assert_eq!(report.summary.chunks_succeeded, 1);
        let tags = report.cards[0].tags();
        assert!(tags.contains("biology"));
        assert!(tags.contains("Plants"));
        assert!(tags.contains("obsidian"));
    }

    #[test]
    fn test_cancelled_run_makes_no_calls() {
        let backend = ScriptedBackend::new(|_| Ok(String::new()));
        let config = GenerationConfig::default();
        let pipeline = Pipeline::new(&backend, &config);
        pipeline.cancel_flag().store(true, Ordering::SeqCst);

        let report = pipeline.run(vec![source("Plants.md", LONG_NOTE)]).unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(report.summary.cancelled);
        assert_eq!(report.summary.chunks_not_attempted, 1);
        assert_eq!(report.summary.skipped[0].reason, SkipReason::NotReached);
    }

    #[test]
    fn test_client_error_stops_remaining_notes() {
        let backend = ScriptedBackend::new(|_| {
            Err(BackendErrorKind::Status {
                code: 404,
                body: "model \"nope\" not found".to_string(),
            })
        });
        let config = GenerationConfig::default();
        let report = Pipeline::new(&backend, &config)
            .run(vec![source("a.md", LONG_NOTE), source("b.md", LONG_NOTE)])
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(report.summary.aborted.is_some());
        assert_eq!(report.summary.chunks_failed(), 1);
        assert_eq!(report.summary.chunks_not_attempted, 1);
    }

    #[test]
    fn test_pooled_client_error_reports_unreached_notes() {
        let backend = ScriptedBackend::new(|_| {
            Err(BackendErrorKind::Status {
                code: 404,
                body: "model \"nope\" not found".to_string(),
            })
        });
        let config = GenerationConfig {
            concurrency: 2,
            ..GenerationConfig::default()
        };
        let names: Vec<String> = (0..10).map(|i| format!("{}.md", i)).collect();
        let sources = names.iter().map(|name| source(name, LONG_NOTE)).collect();
        let report = Pipeline::new(&backend, &config).run(sources).unwrap();

        let calls = backend.calls.load(Ordering::SeqCst);
        let summary = &report.summary;
        assert!(summary.aborted.is_some());
        assert!((1..=10).contains(&calls));
        assert_eq!(summary.chunks_failed(), calls);
        assert_eq!(summary.notes_processed, calls);
        assert_eq!(summary.chunks_not_attempted, 10 - calls);
        assert_eq!(summary.notes_skipped(), 10 - calls);
        assert!(summary
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::NotReached));
        assert_eq!(summary.notes_processed + summary.notes_skipped(), summary.notes_total);
    }

    #[test]
    fn test_pooled_run_matches_sequential_card_count() {
        let backend = ScriptedBackend::new(|call| {
            Ok(format!("Question number {}? | Answer {}", call % 3, call % 3))
        });
        let config = GenerationConfig {
            concurrency: 4,
            max_chunk_size: 200,
            look_back: 50,
            ..GenerationConfig::default()
        };
        let long = LONG_NOTE.repeat(6);
        let report = Pipeline::new(&backend, &config)
            .run(vec![source("a.md", &long), source("b.md", &long)])
            .unwrap();

        let calls = backend.calls.load(Ordering::SeqCst);
        assert_eq!(calls, report.summary.chunks_total);
        assert!(calls > 2);
        assert_eq!(report.cards.len(), 3);
        assert_eq!(report.summary.duplicates, calls - 3);
    }
}
