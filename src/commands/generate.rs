//! The generate command: vault in, flashcard file out

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::commands::report::{render_failures, render_summary};
use vaultcards_core::backend::create_backend;
use vaultcards_core::config::GenerationConfig;
use vaultcards_core::error::{Result, VaultcardsError};
use vaultcards_core::export::{export_to_path, ExportOptions};
use vaultcards_core::pipeline::{Pipeline, ProgressEvent};
use vaultcards_core::summary::SkipReason;
use vaultcards_core::trace_time;
use vaultcards_core::vault;

/// Overlay command-line flags on the layered configuration
pub fn apply_overrides(cli: &Cli, config: &mut GenerationConfig) {
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(url) = &cli.base_url {
        config.base_url = Some(url.clone());
    }
    if let Some(output) = &cli.output {
        config.output_path = output.clone();
    }
    if let Some(size) = cli.max_chunk_size {
        config.max_chunk_size = size;
    }
    if let Some(retries) = cli.max_retries {
        config.max_retries = retries.min(10);
    }
    if let Some(timeout) = cli.timeout_seconds {
        config.timeout_seconds = timeout.clamp(5, 600);
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(language) = &cli.language {
        config.default_language = language.clone();
    }
    config.html |= cli.html;
    config.verbose |= cli.verbose;
}

fn print_progress(event: &ProgressEvent<'_>) {
    match event {
        ProgressEvent::NoteStarted {
            position,
            total,
            path,
            chunks,
        } => {
            let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
            if *chunks > 1 {
                println!("[{}/{}] Processing: {} ({} parts)", position, total, name, chunks);
            } else {
                println!("[{}/{}] Processing: {}", position, total, name);
            }
        }
        ProgressEvent::NoteSkipped {
            position,
            total,
            path,
            reason,
        } => {
            let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
            match reason {
                SkipReason::TooShort { chars, minimum } => println!(
                    "[{}/{}] Skipping: {} ({} chars, need {})",
                    position, total, name, chars, minimum
                ),
                SkipReason::NotReached => println!("[{}/{}] Skipping: {}", position, total, name),
            }
        }
        ProgressEvent::ChunkFinished {
            chunk_index,
            chunk_count,
            new_cards,
            ..
        } => {
            if *chunk_count > 1 {
                println!(
                    "  part {}/{}: {} new cards",
                    chunk_index + 1,
                    chunk_count,
                    new_cards
                );
            } else {
                println!("  {} new cards", new_cards);
            }
        }
        ProgressEvent::ChunkFailed {
            chunk_index,
            chunk_count,
            error,
            ..
        } => {
            println!("  part {}/{} failed: {}", chunk_index + 1, chunk_count, error);
        }
    }
}

fn install_interrupt_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }
    cancel
}

/// Run the whole pipeline for the vault named on the command line
pub fn execute(cli: &Cli, start: Instant) -> Result<()> {
    let mut config = GenerationConfig::layered(cli.config.as_deref())?;
    apply_overrides(cli, &mut config);
    config.resolve();
    config.validate()?;
    debug!(
        provider = %config.provider,
        model = config.model(),
        base_url = config.base_url(),
        "configuration resolved"
    );
    trace_time!(start, "configure");

    let paths = vault::discover(&cli.vault, &config.ignore_patterns, cli.max_files)?;
    if paths.is_empty() {
        if !cli.quiet {
            println!("No Markdown notes found in {}", cli.vault.display());
        }
        return Ok(());
    }
    let sources = vault::load(paths);
    info!(notes = sources.len(), vault = %cli.vault.display(), "loaded notes");
    trace_time!(start, "discover");

    let backend = create_backend(&config);
    if !cli.skip_health_check {
        backend.health_check()?;
        debug!(provider = %config.provider, "backend reachable");
    }

    if !cli.quiet {
        println!(
            "Generating flashcards from {} notes with {} ({})",
            sources.len(),
            config.model(),
            config.provider
        );
    }

    let quiet = cli.quiet;
    let progress = move |event: &ProgressEvent<'_>| {
        if !quiet {
            print_progress(event);
        }
    };
    let report = Pipeline::new(backend.as_ref(), &config)
        .with_cancel_flag(install_interrupt_handler())
        .with_progress(&progress)
        .run(sources)?;
    trace_time!(start, "generate");

    let exported = if report.cards.is_empty() {
        None
    } else {
        let options = ExportOptions { html: config.html };
        export_to_path(&report.cards, &config.output_path, options)?;
        Some(config.output_path.as_path())
    };
    trace_time!(start, "export");

    let summary = &report.summary;
    if !cli.quiet {
        print!("{}", render_summary(summary, exported, config.html));
    }
    eprint!("{}", render_failures(summary));

    if let Some(error) = &summary.aborted {
        return Err(VaultcardsError::Backend(error.clone()));
    }
    if summary.cancelled {
        return Err(VaultcardsError::Interrupted);
    }
    Ok(())
}
