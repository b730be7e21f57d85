//! End-of-run summary for humans

use std::fmt::Write;
use std::path::Path;

use vaultcards_core::summary::{RunSummary, SkipReason, Verdict};

/// Render the summary block printed after a run.
///
/// `export` is the written file, if any.
pub fn render_summary(summary: &RunSummary, export: Option<&Path>, html: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nSummary");
    let _ = writeln!(
        out,
        "  Notes:   {} processed, {} skipped, {} total",
        summary.notes_processed,
        summary.notes_skipped(),
        summary.notes_total
    );
    let _ = writeln!(
        out,
        "  Chunks:  {} ok, {} failed, {} not attempted ({} retries)",
        summary.chunks_succeeded,
        summary.chunks_failed(),
        summary.chunks_not_attempted,
        summary.retries
    );
    let _ = writeln!(
        out,
        "  Cards:   {} ({} duplicates removed, {} rejected)",
        summary.cards, summary.duplicates, summary.rejected
    );

    let too_short = summary
        .skipped
        .iter()
        .filter(|s| matches!(s.reason, SkipReason::TooShort { .. }))
        .count();
    if too_short > 0 {
        let _ = writeln!(out, "  {} note(s) had too little content", too_short);
    }

    match (summary.verdict(), export) {
        (Verdict::Cards(n), Some(path)) => {
            let _ = writeln!(out, "\nWrote {} flashcards to {}", n, path.display());
            let _ = writeln!(out, "Import into Anki with File > Import:");
            let _ = writeln!(out, "  - Field separator: Semicolon");
            let _ = writeln!(out, "  - Map fields: Front, Back, Tags");
            if html {
                let _ = writeln!(out, "  - Enable \"Allow HTML in fields\"");
            }
        }
        (Verdict::Cards(n), None) => {
            let _ = writeln!(out, "\n{} flashcards generated but not written", n);
        }
        (Verdict::EmptyContent, _) => {
            let _ = writeln!(
                out,
                "\nNo flashcards generated: the notes held no usable content"
            );
        }
        (Verdict::BackendFailure, _) => {
            let _ = writeln!(
                out,
                "\nNo flashcards generated: generation failed for {} chunk(s)",
                summary.chunks_failed()
            );
        }
    }

    if summary.is_partial() {
        let _ = writeln!(out, "Run stopped early; results are partial");
    }

    out
}

/// One line per failed chunk, for stderr
pub fn render_failures(summary: &RunSummary) -> String {
    let mut out = String::new();
    for failure in &summary.failures {
        let _ = write!(out, "warning: {}", failure.path.display());
        if failure.chunk_count > 1 {
            let _ = write!(
                out,
                " (part {}/{})",
                failure.chunk_index + 1,
                failure.chunk_count
            );
        }
        let _ = writeln!(out, ": {}", failure.error);
    }
    out
}
