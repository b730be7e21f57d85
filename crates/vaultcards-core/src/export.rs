//! Exporter
//!
//! Writes cards as semicolon-separated UTF-8 text with a `Front;Back;Tags`
//! header. Fields holding the separator, a double quote or a line break are
//! quoted with inner quotes doubled. Tags are space-separated inside their
//! field.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! failed export never leaves a partial file at the destination.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::card::Flashcard;
use crate::error::{Result, VaultcardsError};

pub const FIELD_SEPARATOR: u8 = b';';
pub const HEADER: [&str; 3] = ["Front", "Back", "Tags"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Render card text as Anki HTML
    pub html: bool,
}

/// Escape `<`/`>`/`&`, turn line breaks into `<br>` and collapse spaces
fn html_field(text: &str) -> String {
    text.trim()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Serialize `cards` into the export format
pub fn to_bytes(cards: &[Flashcard], options: ExportOptions) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(FIELD_SEPARATOR)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    let csv_error =
        |e: csv::Error| VaultcardsError::Other(format!("failed to encode cards: {}", e));

    writer.write_record(HEADER).map_err(csv_error)?;
    for card in cards {
        let (front, back) = if options.html {
            (html_field(card.front()), html_field(card.back()))
        } else {
            (card.front().to_string(), card.back().to_string())
        };
        writer
            .write_record([front.as_str(), back.as_str(), card.tag_field().as_str()])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| VaultcardsError::Other(format!("failed to encode cards: {}", e.error())))
}

fn write_synced(temp: &mut tempfile::NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()
}

/// Write `cards` to `path` atomically; returns the number of cards written
pub fn export_to_path(cards: &[Flashcard], path: &Path, options: ExportOptions) -> Result<usize> {
    let bytes = to_bytes(cards, options)?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| VaultcardsError::export(path, e))?;

    let mut temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| VaultcardsError::export(path, e))?;
    write_synced(&mut temp, &bytes).map_err(|e| VaultcardsError::export(path, e))?;
    temp.persist(path)
        .map_err(|e| VaultcardsError::export(path, e.error))?;

    debug!(path = %path.display(), cards = cards.len(), bytes = bytes.len(), "export written");
    Ok(cards.len())
}
