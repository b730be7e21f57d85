//! YAML front-matter handling for Obsidian notes

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::text::cached_regex;

static INLINE_TAG: OnceLock<Option<Regex>> = OnceLock::new();

/// `#tag` preceded by start of text, whitespace or an opening parenthesis
pub(crate) fn inline_tag_regex() -> Option<&'static Regex> {
    cached_regex(&INLINE_TAG, r"(^|[ \t\n(])#([A-Za-z][A-Za-z0-9_/-]*)")
}

/// Split a leading `---` YAML block from the body.
///
/// Returns `(Some(yaml), body)` when the note opens with a closed
/// front-matter block, otherwise `(None, content)`.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let rest = match content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, content),
    };

    // Empty block: `---\n---`
    if let Some(body) = rest.strip_prefix("---") {
        return (Some(""), body.trim_start_matches(['\r', '\n']));
    }

    match rest.find("\n---") {
        Some(end) => {
            let yaml = &rest[..end];
            let after = &rest[end + 4..];
            // The closing fence must stand alone on its line
            let line_end = after.find('\n').map(|i| i + 1).unwrap_or(after.len());
            if after[..line_end].trim().is_empty() {
                (Some(yaml), &after[line_end..])
            } else {
                (None, content)
            }
        }
        None => (None, content),
    }
}

/// Extract `tags` from a YAML front-matter block.
///
/// Accepts a sequence (`tags: [a, b]`) or a comma/space separated string.
/// Malformed YAML yields no tags rather than an error.
pub fn frontmatter_tags(yaml: &str) -> Vec<String> {
    let parsed: HashMap<String, serde_yaml::Value> = match serde_yaml::from_str(yaml) {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unparseable front-matter");
            return Vec::new();
        }
    };

    let mut tags = Vec::new();
    if let Some(value) = parsed.get("tags").or_else(|| parsed.get("tag")) {
        match value {
            serde_yaml::Value::Sequence(seq) => {
                for item in seq {
                    if let serde_yaml::Value::String(s) = item {
                        push_tag(&mut tags, s);
                    }
                }
            }
            serde_yaml::Value::String(s) => {
                for tag in s.split(|c: char| c == ',' || c.is_whitespace()) {
                    push_tag(&mut tags, tag);
                }
            }
            _ => {}
        }
    }
    tags
}

/// Extract inline `#tags` from note text
pub fn inline_tags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let Some(re) = inline_tag_regex() else {
        return tags;
    };
    for cap in re.captures_iter(content) {
        if let Some(m) = cap.get(2) {
            push_tag(&mut tags, m.as_str());
        }
    }
    tags
}

fn push_tag(tags: &mut Vec<String>, raw: &str) {
    let tag = raw.trim().trim_start_matches('#');
    if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_frontmatter() {
        let (yaml, body) = split_frontmatter("---\ntitle: Test\n---\nBody text");
        assert_eq!(yaml, Some("title: Test"));
        assert_eq!(body, "Body text");
    }

    #[test]
    fn test_split_without_frontmatter() {
        let (yaml, body) = split_frontmatter("Just a note");
        assert!(yaml.is_none());
        assert_eq!(body, "Just a note");
    }

    #[test]
    fn test_unclosed_frontmatter_is_body() {
        let content = "---\ntitle: Test\nno closing fence";
        let (yaml, body) = split_frontmatter(content);
        assert!(yaml.is_none());
        assert_eq!(body, content);
    }

    #[test]
    fn test_frontmatter_tags_sequence_and_string() {
        assert_eq!(
            frontmatter_tags("tags:\n  - biology\n  - '#cells'"),
            vec!["biology", "cells"]
        );
        assert_eq!(
            frontmatter_tags("tags: history, rome"),
            vec!["history", "rome"]
        );
        assert!(frontmatter_tags("title: [unclosed").is_empty());
    }

    #[test]
    fn test_inline_tags() {
        let tags = inline_tags("#biology notes about (#cells) and issue#12 and # heading");
        assert_eq!(tags, vec!["biology", "cells"]);
    }
}
