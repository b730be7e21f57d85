//! Response Parser
//!
//! Turns a backend's free-form reply into flashcard candidates. Three shapes
//! are understood, tried in this order:
//!
//! 1. A JSON object with a `flashcards` array (when the reply looks like JSON)
//! 2. One card per line: `front | back | tags`
//! 3. Labelled blocks: `Q:` / `A:` (also `Question:`/`Answer:` and
//!    `Domanda:`/`Risposta:`)
//!
//! Lines that are not cards are skipped. A reply with no usable cards gives
//! an empty list, never an error.

use serde::Deserialize;
use tracing::debug;

use crate::card::{FlashcardCandidate, Provenance};

/// Field delimiter of the line format
pub const FIELD_DELIMITER: char = '|';

const QUESTION_LABELS: &[&str] = &["Question:", "Domanda:", "Q:"];
const ANSWER_LABELS: &[&str] = &["Answer:", "Risposta:", "A:"];

/// A parsed card before provenance is attached
#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    front: String,
    back: String,
    tags: Vec<String>,
}

impl Draft {
    fn into_candidate(self, provenance: &Provenance) -> FlashcardCandidate {
        FlashcardCandidate {
            front: self.front,
            back: self.back,
            tags: self.tags,
            provenance: provenance.clone(),
        }
    }
}

/// Parse a raw reply into candidates tagged with `provenance`
pub fn parse(reply: &str, provenance: &Provenance) -> Vec<FlashcardCandidate> {
    parse_drafts(reply)
        .into_iter()
        .map(|draft| draft.into_candidate(provenance))
        .collect()
}

fn parse_drafts(reply: &str) -> Vec<Draft> {
    let reply = reply.replace("\r\n", "\n");

    if looks_like_json(&reply) {
        let cards = parse_json(&reply);
        if !cards.is_empty() {
            return cards;
        }
    }

    let cards = parse_lines(&reply);
    if !cards.is_empty() {
        return cards;
    }

    parse_labelled(&reply)
}

fn looks_like_json(reply: &str) -> bool {
    let body = reply
        .trim_start()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_start();
    body.starts_with('{') || reply.contains("\"flashcards\"")
}

#[derive(Debug, Deserialize)]
struct JsonEnvelope {
    #[serde(default)]
    flashcards: Vec<JsonCard>,
}

#[derive(Debug, Deserialize)]
struct JsonCard {
    #[serde(alias = "front")]
    question: Option<String>,
    #[serde(alias = "back")]
    answer: Option<String>,
    #[serde(default)]
    tags: JsonTags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum JsonTags {
    #[default]
    None,
    List(Vec<String>),
    Text(String),
}

impl JsonTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            JsonTags::None => Vec::new(),
            JsonTags::List(tags) => tags,
            JsonTags::Text(text) => split_tags(&text),
        }
    }
}

/// The outermost `{ ... }` span of the reply, decoded leniently
fn parse_json(reply: &str) -> Vec<Draft> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let envelope: JsonEnvelope = match serde_json::from_str(&reply[start..=end]) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "reply looked like JSON but did not decode");
            return Vec::new();
        }
    };

    envelope
        .flashcards
        .into_iter()
        .filter_map(|card| {
            let front = card.question?.trim().to_string();
            let back = card.answer?.trim().to_string();
            if front.is_empty() || back.is_empty() {
                return None;
            }
            Some(Draft {
                front,
                back,
                tags: card.tags.into_vec(),
            })
        })
        .collect()
}

fn parse_lines(reply: &str) -> Vec<Draft> {
    let mut cards = Vec::new();

    for (line_no, line) in reply.lines().enumerate() {
        let line = line.trim();
        if line.starts_with("```") || !line.contains(FIELD_DELIMITER) {
            continue;
        }

        match parse_line(line) {
            Some(draft) => cards.push(draft),
            None => debug!(line = line_no + 1, text = line, "skipping reply line"),
        }
    }

    cards
}

/// Parse one `front | back | tags` line
fn parse_line(line: &str) -> Option<Draft> {
    let line = strip_list_marker(line);
    let line = line
        .strip_prefix(FIELD_DELIMITER)
        .unwrap_or(line)
        .trim_end();
    let line = match line.strip_suffix(FIELD_DELIMITER) {
        Some(inner) if !inner.ends_with('\\') => inner,
        _ => line,
    };

    let fields = split_unescaped(line, 3);
    if fields.len() < 2 {
        return None;
    }

    let mut front = clean_field(&fields[0], QUESTION_LABELS);
    let mut back = clean_field(&fields[1], ANSWER_LABELS);
    let tags = fields.get(2).map(|t| split_tags(t)).unwrap_or_default();

    if is_table_separator(&front, &back) || is_header(&front, &back) {
        return None;
    }

    if !front.ends_with('?') && back.ends_with('?') {
        debug!(front = %front, back = %back, "answer-first line, swapping fields");
        std::mem::swap(&mut front, &mut back);
    }

    if front.is_empty() || back.is_empty() {
        return None;
    }

    Some(Draft { front, back, tags })
}

/// Split on unescaped delimiters, at most `limit` fields; the last field
/// keeps any remaining delimiters. `\|` becomes a literal `|`.
fn split_unescaped(line: &str, limit: usize) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&FIELD_DELIMITER) {
            current.push(FIELD_DELIMITER);
            chars.next();
        } else if c == FIELD_DELIMITER && fields.len() + 1 < limit {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    for bullet in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }

    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    trimmed
}

/// Trim a field and drop a leading `Q:`-style label and bold markers
fn clean_field(field: &str, labels: &[&str]) -> String {
    let field = field.trim();
    let unlabelled = strip_label(field, labels).unwrap_or(field);
    unlabelled.trim_matches('*').trim().to_string()
}

fn strip_label<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let line = line.trim_start_matches('*').trim_start();
    labels.iter().find_map(|label| {
        let head = line.get(..label.len())?;
        if head.eq_ignore_ascii_case(label) {
            Some(line[label.len()..].trim_start_matches('*').trim())
        } else {
            None
        }
    })
}

fn is_table_separator(front: &str, back: &str) -> bool {
    let rule = |s: &str| !s.is_empty() && s.chars().all(|c| matches!(c, '-' | ':' | ' '));
    rule(front) && rule(back)
}

fn is_header(front: &str, back: &str) -> bool {
    let front = front.to_lowercase();
    let back = back.to_lowercase();
    matches!(front.as_str(), "question" | "front" | "domanda")
        && matches!(back.as_str(), "answer" | "back" | "risposta")
}

/// Tags separated by `;`, `,`, `|` or whitespace
pub fn split_tags(field: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in field.split(|c: char| c == ';' || c == ',' || c == '|' || c.is_whitespace()) {
        let tag = tag.trim().trim_start_matches('#');
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// `Q:` / `A:` blocks; answer text may continue over following lines
fn parse_labelled(reply: &str) -> Vec<Draft> {
    let mut cards = Vec::new();
    let mut question: Option<String> = None;
    let mut answer: Vec<String> = Vec::new();

    let mut flush = |question: &mut Option<String>, answer: &mut Vec<String>| {
        if let Some(q) = question.take() {
            let a = answer.join(" ").trim().to_string();
            if !q.is_empty() && !a.is_empty() {
                cards.push(Draft {
                    front: q,
                    back: a,
                    tags: Vec::new(),
                });
            }
        }
        answer.clear();
    };

    for line in reply.lines() {
        let line = line.trim();
        if let Some(q) = strip_label(line, QUESTION_LABELS) {
            flush(&mut question, &mut answer);
            question = Some(q.to_string());
        } else if let Some(a) = strip_label(line, ANSWER_LABELS) {
            answer.clear();
            if !a.is_empty() {
                answer.push(a.to_string());
            }
        } else if question.is_some()
            && !line.is_empty()
            && !line.starts_with(['-', '*', '+'])
        {
            answer.push(line.to_string());
        }
    }
    flush(&mut question, &mut answer);

    cards
}
