//! Stop-word based language detection
//!
//! Counts hits against small per-language stop-word lists and picks the
//! clear winner. Short texts and close calls are reported as inconclusive
//! so the caller can fall back to its configured default.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Texts shorter than this are never guessed
pub const MIN_DETECTION_CHARS: usize = 40;

/// Minimum stop-word hits for the winning language
const MIN_HITS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Italian,
    Spanish,
    French,
    German,
    Portuguese,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Italian,
        Language::Spanish,
        Language::French,
        Language::German,
        Language::Portuguese,
    ];

    /// Human-readable name, used as the card tag and in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Italian => "Italian",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::Portuguese => "Portuguese",
        }
    }

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Italian => "it",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
            Language::Portuguese => "pt",
        }
    }

    fn stop_words(&self) -> &'static [&'static str] {
        match self {
            Language::English => &[
                "the", "and", "is", "are", "of", "to", "in", "that", "it", "with", "for", "as",
                "was", "on", "this", "be", "by", "which", "from", "or", "an", "at", "not",
            ],
            Language::Italian => &[
                "il", "lo", "la", "gli", "le", "di", "che", "è", "e", "per", "un", "una", "del",
                "della", "sono", "con", "non", "nel", "nella", "si", "anche", "come", "alla",
            ],
            Language::Spanish => &[
                "el", "la", "los", "las", "de", "que", "y", "es", "en", "un", "una", "por",
                "con", "para", "del", "se", "no", "son", "como", "pero", "al", "más", "está",
            ],
            Language::French => &[
                "le", "la", "les", "de", "des", "du", "et", "est", "un", "une", "que", "qui",
                "dans", "pour", "pas", "sur", "avec", "sont", "au", "aux", "ce", "cette", "il",
            ],
            Language::German => &[
                "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "zu", "den", "von",
                "mit", "sich", "des", "auf", "für", "im", "dem", "sind", "auch", "wird", "es",
            ],
            Language::Portuguese => &[
                "o", "a", "os", "as", "de", "que", "e", "é", "do", "da", "em", "um", "uma",
                "para", "com", "não", "no", "na", "por", "mais", "dos", "das", "são",
            ],
        }
    }

    fn stop_word_set(&self) -> &'static HashSet<&'static str> {
        static SETS: OnceLock<Vec<HashSet<&'static str>>> = OnceLock::new();
        let sets = SETS.get_or_init(|| {
            Language::ALL
                .iter()
                .map(|lang| lang.stop_words().iter().copied().collect())
                .collect()
        });
        &sets[*self as usize]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of language detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Detected(Language),
    /// Too little text or no clear winner
    Inconclusive,
}

impl Detection {
    pub fn language(&self) -> Option<Language> {
        match self {
            Detection::Detected(language) => Some(*language),
            Detection::Inconclusive => None,
        }
    }
}

/// Lowercased words split on anything that is not a letter
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

/// Guess the dominant language of cleaned note text
pub fn detect_language(text: &str) -> Detection {
    if text.trim().chars().count() < MIN_DETECTION_CHARS {
        return Detection::Inconclusive;
    }

    let mut hits = vec![0usize; Language::ALL.len()];
    for word in words(text) {
        for (i, lang) in Language::ALL.iter().enumerate() {
            if lang.stop_word_set().contains(word.as_str()) {
                hits[i] += 1;
            }
        }
    }

    let mut ranked: Vec<(Language, usize)> = Language::ALL.iter().copied().zip(hits).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    match ranked.as_slice() {
        [(best, best_hits), (_, runner_up), ..]
            if *best_hits >= MIN_HITS && best_hits > runner_up =>
        {
            Detection::Detected(*best)
        }
        _ => Detection::Inconclusive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english() {
        let text = "Paris is the capital of France. The Eiffel Tower is in Paris and it was built for the fair.";
        assert_eq!(detect_language(text), Detection::Detected(Language::English));
    }

    #[test]
    fn test_detects_italian() {
        let text = "La fotosintesi è il processo con cui le piante producono energia. Non è un processo semplice, ma è anche molto antico.";
        assert_eq!(detect_language(text), Detection::Detected(Language::Italian));
    }

    #[test]
    fn test_detects_german() {
        let text = "Die Zelle ist die kleinste Einheit des Lebens und sie wird von einer Membran umgeben, die nicht durchlässig ist.";
        assert_eq!(detect_language(text), Detection::Detected(Language::German));
    }

    #[test]
    fn test_short_text_is_inconclusive() {
        assert_eq!(detect_language("the cat is on the mat"), Detection::Inconclusive);
    }

    #[test]
    fn test_no_stop_words_is_inconclusive() {
        let text = "Mitochondria ATP synthase oxidative phosphorylation electron transport chain";
        assert_eq!(detect_language(text), Detection::Inconclusive);
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::English.code(), "en");
        assert_eq!(Language::Italian.name(), "Italian");
        assert_eq!(Language::French.to_string(), "French");
    }
}
