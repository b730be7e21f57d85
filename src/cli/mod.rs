//! CLI argument parsing for vaultcards

pub mod parse;

use clap::Parser;
use std::path::PathBuf;

use parse::{parse_positive, parse_provider};
use vaultcards_core::config::Provider;

/// Vaultcards - turn an Obsidian vault into Anki flashcards with a local LLM
#[derive(Parser, Debug)]
#[command(name = "vaultcards")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory of the vault
    pub vault: PathBuf,

    /// Output file for the semicolon-separated export
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Inference server (ollama or lmstudio)
    #[arg(long, short, value_parser = parse_provider)]
    pub provider: Option<Provider>,

    /// Model name (provider default when omitted)
    #[arg(long, short)]
    pub model: Option<String>,

    /// Server base URL (provider default when omitted)
    #[arg(long = "url", short = 'u')]
    pub base_url: Option<String>,

    /// Process at most this many notes
    #[arg(long, value_parser = parse_positive)]
    pub max_files: Option<usize>,

    /// Notes longer than this many characters are split
    #[arg(long)]
    pub max_chunk_size: Option<usize>,

    /// Retries per chunk for transient failures
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout_seconds: Option<u64>,

    /// Concurrent generation calls
    #[arg(long, value_parser = parse_positive)]
    pub concurrency: Option<usize>,

    /// Language assumed when detection is inconclusive
    #[arg(long)]
    pub language: Option<String>,

    /// TOML configuration file
    #[arg(long, env = "VAULTCARDS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export card text as Anki HTML
    #[arg(long)]
    pub html: bool,

    /// Do not probe the server before generating
    #[arg(long)]
    pub skip_health_check: bool,

    /// Log per-stage progress
    #[arg(long, short)]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(long, short)]
    pub quiet: bool,

    /// Log level or filter directives (e.g. debug, vaultcards_core=trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs and errors as JSON
    #[arg(long)]
    pub log_json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from([
            "vaultcards",
            "vault",
            "-p",
            "lmstudio",
            "-o",
            "deck.csv",
            "--max-files",
            "10",
            "--timeout",
            "30",
            "--html",
        ])
        .unwrap();
        assert_eq!(cli.vault, PathBuf::from("vault"));
        assert_eq!(cli.provider, Some(Provider::LmStudio));
        assert_eq!(cli.output, Some(PathBuf::from("deck.csv")));
        assert_eq!(cli.max_files, Some(10));
        assert_eq!(cli.timeout_seconds, Some(30));
        assert!(cli.html);
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = Cli::try_parse_from(["vaultcards", "vault", "-p", "kobold"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
