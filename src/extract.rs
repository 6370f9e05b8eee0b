//! Recovery of structured pieces (one JSON object, one code block, a tagged
//! file) from free-form model output.

use crate::error::AssistError;
use regex::Regex;

/// Return the first `{` .. last `}` span of `text`, after removing fence
/// markers.
///
/// This is a heuristic, not a parser: the span is greedy and ignores nesting,
/// so two top-level objects, or a literal `}` inside a string after the final
/// structural brace, produce a span that will not parse. Callers treat a parse
/// failure the same way as a missing object.
pub fn extract_json(text: &str) -> Result<String, AssistError> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(cleaned[s..=e].to_string()),
        _ => Err(AssistError::MalformedOutput("no JSON object found in model output".to_string())),
    }
}

fn code_start_token(marker: &str) -> Option<&'static str> {
    match marker {
        "php" => Some("<?php"),
        _ => None,
    }
}

/// Content of the first ```` ```<marker> ```` block; else everything from the
/// language's opening token; else `text` untouched.
pub fn extract_code(text: &str, marker: &str) -> String {
    let pattern = format!(r"(?s)```{}[ \t]*\r?\n?(.*?)```", regex::escape(marker));
    if let Ok(re) = Regex::new(&pattern) {
        if let Some(caps) = re.captures(text) {
            return caps[1].trim().to_string();
        }
    }
    if let Some(token) = code_start_token(marker) {
        if let Some(idx) = text.find(token) {
            return text[idx..].trim().to_string();
        }
    }
    text.to_string()
}

/// Drop a leading fence line and a trailing closing fence, if present.
pub fn strip_fences(content: &str) -> String {
    let mut lines: Vec<&str> = content.lines().collect();

    if let Some(first) = lines.first() {
        if first.trim().starts_with("```") {
            lines.remove(0);
        }
    }

    if let Some(last) = lines.last() {
        if last.trim() == "```" {
            lines.pop();
        }
    }

    lines.join("\n")
}

/// Parse a `FILE: <path>` / `CONTENT:` fenced answer into `(path, content)`.
pub fn parse_tagged_file(text: &str) -> Option<(String, String)> {
    let re = Regex::new(
        r"(?s)(?:FILE|FICHIER):\s*([^\n]+?)\s*(?:CONTENT|CONTENU):\s*```(?:php)?[ \t]*\r?\n?(.*?)```",
    )
    .ok()?;
    let caps = re.captures(text)?;
    let path = caps[1].trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').to_string();
    let content = caps[2].trim().to_string();
    if path.is_empty() {
        return None;
    }
    Some((path, content))
}
