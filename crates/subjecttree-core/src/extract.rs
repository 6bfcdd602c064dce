//! Best-effort location of a single JSON value inside free-form model output.
//!
//! Only delimits the value. Callers parse and validate what comes back.

use crate::error::{Result, SubjectTreeError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Conversational filler that models wrap around structured output. Matches
/// are skipped when looking for the opening bracket so that a bracketed aside
/// such as `[Note] ...` is not mistaken for the payload.
static BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^[ \t]*(?:here(?:'s| is| are)|below is|sure|certainly|of course|okay|ok)\b[^\n{\[]*",
        r"(?im)^[ \t]*\[(?:note|info|warning|thinking|system)\][^\n{\[]*",
        r"(?im)^[ \t]*(?:note|remember|output format|format|example)\s*:[^\n{\[]*",
        r"(?is)<think>.*?</think>",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Return the first balanced JSON object or array in `text`.
///
/// When a fenced code block is present the search starts inside it. Falls
/// back to the whole text if the fenced block holds no balanced value.
pub fn extract_json(text: &str) -> Result<&str> {
    if let Some(body_start) = fenced_body_start(text) {
        if let Some(found) = scan_from(text, body_start) {
            return Ok(found);
        }
    }

    scan_from(text, 0).ok_or_else(|| {
        let preview: String = text.chars().take(80).collect();
        if find_opening(text, 0).is_none() {
            SubjectTreeError::Extraction(format!("no '{{' or '[' in output: {:?}", preview))
        } else {
            SubjectTreeError::Extraction(format!(
                "unbalanced JSON (output may be truncated): {:?}",
                preview
            ))
        }
    })
}

fn fenced_body_start(text: &str) -> Option<usize> {
    let fence = text.find("```")?;
    let after = fence + 3;
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    match text[after..].find('\n') {
        Some(newline) => Some(after + newline + 1),
        None => Some(after),
    }
}

// No retry past an unbalanced candidate: later openings sit inside it.
fn scan_from(text: &str, from: usize) -> Option<&str> {
    let open = find_opening(text, from)?;
    matching_close(text, open).map(|end| &text[open..end])
}

fn boilerplate_ranges(text: &str) -> Vec<Range<usize>> {
    BOILERPLATE
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.range()))
        .collect()
}

fn find_opening(text: &str, from: usize) -> Option<usize> {
    let skipped = boilerplate_ranges(text);
    text[from..]
        .char_indices()
        .map(|(i, c)| (from + i, c))
        .find(|(i, c)| matches!(c, '{' | '[') && !skipped.iter().any(|r| r.contains(i)))
        .map(|(i, _)| i)
}

/// Byte offset one past the bracket that closes the one at `open`.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let json = r#"{"name":"Algebra","children":[]}"#;
        assert_eq!(extract_json(json).unwrap(), json);
    }

    #[test]
    fn test_prefix_and_suffix_are_stripped() {
        let json = r#"{"name":"Algebra","children":[{"name":"Rings","children":[]}]}"#;
        let text = format!("Here is the tree you asked for:\n{}\nLet me know if you need more!", json);
        assert_eq!(extract_json(&text).unwrap(), json);
    }

    #[test]
    fn test_fenced_block() {
        let json = "{\n  \"name\": \"Physics\",\n  \"children\": []\n}";
        let text = format!("Sure!\n```json\n{}\n```\nThat is all.", json);
        assert_eq!(extract_json(&text).unwrap(), json);
    }

    #[test]
    fn test_braces_inside_strings() {
        let json = r#"{"name":"a{b}c","children":[]}"#;
        assert_eq!(extract_json(json).unwrap(), json);

        let tricky = r#"{"name":"quote \" and ] brace }","children":[]}"#;
        assert_eq!(extract_json(&format!("x {} y", tricky)).unwrap(), tricky);
    }

    #[test]
    fn test_fence_inside_string_value() {
        let json = r#"{"name":"Markdown","description":"use ```code``` fences","children":[]}"#;
        let text = format!("```json\n{}\n```", json);
        assert_eq!(extract_json(&text).unwrap(), json);
    }

    #[test]
    fn test_array_payload() {
        let json = r#"[{"name":"Eigenvalues","children":[]}]"#;
        assert_eq!(extract_json(&format!("Output:\n{}", json)).unwrap(), json);
    }

    #[test]
    fn test_note_tag_is_skipped() {
        let json = r#"{"name":"Chemistry","children":[]}"#;
        let text = format!("[Note] generated quickly\n{}", json);
        assert_eq!(extract_json(&text).unwrap(), json);
    }

    #[test]
    fn test_label_prefix_on_same_line() {
        let json = r#"{"name":"X","children":[]}"#;
        for prefix in ["Note: ", "Output format: ", "Example: ", "[Note] ", "Sure, "] {
            let text = format!("{}{} trailing words", prefix, json);
            assert_eq!(extract_json(&text).unwrap(), json, "prefix {:?}", prefix);
        }
    }

    #[test]
    fn test_unbalanced_fails() {
        let err = extract_json(r#"{"name":"Algebra","children":[{"name":"Lin"#).unwrap_err();
        assert!(matches!(err, SubjectTreeError::Extraction(_)));
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn test_no_bracket_fails() {
        let err = extract_json("I cannot help with that.").unwrap_err();
        assert!(matches!(err, SubjectTreeError::Extraction(_)));
    }
}
