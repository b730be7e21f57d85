//! Vaultcards Core Library
//!
//! Turns a vault of Markdown notes into deduplicated flashcards using a
//! local text-generation server.

pub mod aggregate;
pub mod backend;
pub mod card;
pub mod chunk;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod note;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod summary;
pub mod text;
pub mod vault;
