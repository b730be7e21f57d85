//! CLI commands for vaultcards

pub mod generate;
pub mod report;
