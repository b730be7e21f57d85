//! Text normalization for Obsidian notes
//!
//! Strips Obsidian and Markdown syntax so the generation prompt sees plain
//! prose. Link display text, emphasised words and list items are kept; code
//! fences, comments, embeds and front-matter are dropped entirely.

pub mod language;

use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::warn;

use crate::note::frontmatter::{inline_tag_regex, split_frontmatter};

/// Compile `pattern` once into `cell`.
///
/// A pattern that fails to compile is logged and then treated as absent, so
/// cleaning degrades to a no-op instead of failing the run.
pub(crate) fn cached_regex(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, pattern, "Failed to compile regex");
            None
        }
    })
    .as_ref()
}

macro_rules! rule {
    ($name:ident, $pattern:expr) => {
        fn $name() -> Option<&'static Regex> {
            static CELL: OnceLock<Option<Regex>> = OnceLock::new();
            cached_regex(&CELL, $pattern)
        }
    };
}

rule!(backtick_fence, r"(?ms)^[ \t]*```[^\n]*\n.*?^[ \t]*```[ \t]*$\n?");
rule!(tilde_fence, r"(?ms)^[ \t]*~~~[^\n]*\n.*?^[ \t]*~~~[ \t]*$\n?");
rule!(html_comment, r"(?s)<!--.*?-->");
rule!(obsidian_comment, r"(?s)%%.*?%%");
rule!(embed, r"!\[\[[^\]\n]*\]\]");
rule!(image, r"!\[[^\]\n]*\]\([^)\n]*\)");
rule!(wiki_link, r"\[\[([^\]\n]+)\]\]");
rule!(markdown_link, r"\[([^\]\n]+)\]\([^)\n]*\)");
rule!(heading, r"(?m)^[ \t]{0,3}#{1,6}[ \t]+");
rule!(
    blockquote,
    r"(?m)^[ \t]*>[ \t]?(?:\[![^\]\n]*\][+-]?[ \t]*)?"
);
rule!(horizontal_rule, r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$");
rule!(
    list_marker,
    r"(?m)^[ \t]*(?:[-*+]|\d{1,3}[.)])[ \t]+(?:\[[ xX]\][ \t]+)?"
);
rule!(bold_stars, r"\*\*([^*\n]+?)\*\*");
rule!(bold_underscores, r"__([^_\n]+?)__");
rule!(italic_stars, r"\*([^*\s][^*\n]*?)\*");
rule!(italic_underscores, r"\b_([^_\n]+?)_\b");
rule!(strikethrough, r"~~([^~\n]+?)~~");
rule!(highlight, r"==([^=\n]+?)==");
rule!(inline_code, r"`([^`\n]+)`");
rule!(horizontal_space, r"[ \t]+");
rule!(line_edge_space, r"(?m)^ | $");
rule!(blank_lines, r"\n{3,}");
rule!(math_block, r"(?s)\$\$.*?\$\$");
rule!(inline_math, r"\$[^$\n]+\$");

fn replace(text: String, re: Option<&'static Regex>, with: &str) -> String {
    match re {
        Some(re) => re.replace_all(&text, with).into_owned(),
        None => text,
    }
}

/// Display text of a wiki link: the alias after `|`, else the target
/// without its `#heading` or `^block` suffix.
fn wiki_link_text(caps: &Captures<'_>) -> String {
    let inner = caps[1].trim();
    if let Some((_, alias)) = inner.rsplit_once('|') {
        return alias.trim().to_string();
    }
    let target = inner.split(['#', '^']).next().unwrap_or("").trim();
    if target.is_empty() {
        inner.trim_start_matches(['#', '^']).trim().to_string()
    } else {
        target.to_string()
    }
}

/// Clean raw note text into prose suitable for a generation prompt.
///
/// Pure and infallible; text without any markup comes back unchanged apart
/// from whitespace normalization.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n");
    let (_, body) = split_frontmatter(&unified);
    let mut text = body.to_string();

    // Blocks that are dropped wholesale
    text = replace(text, backtick_fence(), "");
    text = replace(text, tilde_fence(), "");
    text = replace(text, html_comment(), "");
    text = replace(text, obsidian_comment(), "");
    text = replace(text, embed(), "");
    text = replace(text, image(), "");

    // Links keep their display text
    if let Some(re) = wiki_link() {
        text = re.replace_all(&text, wiki_link_text).into_owned();
    }
    text = replace(text, markdown_link(), "$1");
    text = replace(text, inline_tag_regex(), "$1");

    // Line-level markers, outermost first
    text = replace(text, heading(), "");
    text = replace(text, blockquote(), "");
    text = replace(text, horizontal_rule(), "");
    text = replace(text, list_marker(), "");

    // Inline emphasis keeps the words
    text = replace(text, bold_stars(), "$1");
    text = replace(text, bold_underscores(), "$1");
    text = replace(text, italic_stars(), "$1");
    text = replace(text, italic_underscores(), "$1");
    text = replace(text, strikethrough(), "$1");
    text = replace(text, highlight(), "$1");
    text = replace(text, inline_code(), "$1");

    text = replace(text, horizontal_space(), " ");
    text = replace(text, line_edge_space(), "");
    text = replace(text, blank_lines(), "\n\n");

    text.trim().to_string()
}

/// Count of characters that carry meaning: letters, digits and basic
/// punctuation, with whitespace runs counted once.
///
/// LaTeX (`$$...$$` blocks and `$...$` inline) is not prose and counts as
/// nothing, though it stays in the generation text.
pub fn meaningful_len(text: &str) -> usize {
    let text = replace(text.to_string(), math_block(), " ");
    let text = replace(text, inline_math(), " ");

    let mut count = 0;
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = count > 0;
        } else if c.is_alphanumeric() || ".,:;?!()'_".contains(c) {
            if pending_space {
                count += 1;
                pending_space = false;
            }
            count += 1;
        }
    }
    count
}
