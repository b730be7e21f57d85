//! Generation prompt for one chunk

use std::fmt::Write;

/// What the prompt needs to know about the chunk's origin
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// File name shown to the model
    pub file_name: &'a str,
    /// 1-based part number and part count, when the note was split
    pub part: Option<(usize, usize)>,
    /// Language the cards should be written in
    pub language: &'a str,
}

impl PromptContext<'_> {
    /// `notes.md` or `notes.md (part 2/3)`
    pub fn source_label(&self) -> String {
        match self.part {
            Some((index, total)) if total > 1 => {
                format!("{} (part {}/{})", self.file_name, index, total)
            }
            _ => self.file_name.to_string(),
        }
    }
}

const RULES: &[&str] = &[
    "Create as many high-quality flashcards as the content supports",
    "Questions must be clear and specific; they may be tricky to test real understanding",
    "Answers must explain the concept, not just name it",
    "Avoid questions that are too obvious or too vague",
    "Focus on key concepts, definitions and important examples",
    "Fix any grammar or spelling mistakes from the content",
    "If the content has formulas or code, ask about the concepts without LaTeX or code syntax",
    "Always respond with flashcards, even for dense or technical content",
];

/// Build the prompt sent to the backend for one chunk of note text
pub fn build_prompt(context: &PromptContext<'_>, chunk: &str) -> String {
    let mut prompt = String::with_capacity(chunk.len() + 1024);

    let _ = writeln!(
        prompt,
        "Analyze the following content from file \"{}\" and create study flashcards.",
        context.source_label()
    );
    let _ = writeln!(
        prompt,
        "Write every question and answer in {}, the language of the content.",
        context.language
    );

    prompt.push_str("\nRULES:\n");
    for (i, rule) in RULES.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, rule);
    }

    prompt.push_str(
        "\nOUTPUT FORMAT:\n\
         One flashcard per line, nothing else. No numbering, no markdown, no commentary.\n\
         question | answer | tags\n\
         Tags are optional, separated by semicolons. Write \\| for a literal | inside a field.\n\
         Example:\n\
         What is the capital of France? | Paris is the capital of France. | geography;europe\n",
    );

    prompt.push_str("\nCONTENT TO ANALYZE:\n");
    prompt.push_str(chunk);
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_file_part_and_language() {
        let context = PromptContext {
            file_name: "Cells.md",
            part: Some((2, 3)),
            language: "Italian",
        };
        let prompt = build_prompt(&context, "La cellula è l'unità della vita.");

        assert!(prompt.contains("\"Cells.md (part 2/3)\""));
        assert!(prompt.contains("in Italian"));
        assert!(prompt.contains("question | answer | tags"));
        assert!(prompt.ends_with("La cellula è l'unità della vita.\n"));
    }

    #[test]
    fn test_single_part_has_plain_label() {
        let context = PromptContext {
            file_name: "Rome.md",
            part: Some((1, 1)),
            language: "English",
        };
        assert_eq!(context.source_label(), "Rome.md");
    }
}
