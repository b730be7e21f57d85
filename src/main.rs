//! Vaultcards - flashcards from an Obsidian vault
//!
//! Walks a vault of Markdown notes, asks a local inference server (Ollama or
//! LM Studio) for question/answer pairs, and writes a deduplicated,
//! semicolon-separated file ready for Anki import.

mod cli;
mod commands;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use cli::Cli;
use vaultcards_core::error::ExitCode as VaultcardsExitCode;
use vaultcards_core::logging;

fn main() -> ExitCode {
    let start = Instant::now();

    // Help, version and usage errors exit here (usage errors with code 2)
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::debug!(elapsed = ?start.elapsed(), "parse_args");

    match commands::generate::execute(&cli, start) {
        Ok(()) => ExitCode::from(VaultcardsExitCode::Success as u8),
        Err(e) => {
            if cli.log_json {
                eprintln!("{}", e.to_json());
            } else {
                eprintln!("error: {}", e);
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
