//! Pulling diagram code and JSON payloads out of free-form model replies.
//!
//! Each extractor is a pure function returning `Option`; the pipeline takes
//! the first one that yields something.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub type Extractor = fn(&str) -> Option<String>;

/// Strategies in the order they are tried.
pub const CODE_EXTRACTORS: [Extractor; 3] = [tagged_fence, keyword_fence, json_code_field];

const DIAGRAM_KEYWORDS: [&str; 6] = [
    "flowchart",
    "graph",
    "sequencediagram",
    "classdiagram",
    "statediagram",
    "erdiagram",
];

const JSON_CODE_FIELDS: [&str; 3] = ["mermaid_code", "code", "mermaid"];

static TAGGED_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)```\s*mermaid[^\S\n]*\n?(.*?)```").expect("valid fence regex")
});
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n?(.*?)```").expect("valid fence regex"));

/// Run the extractor chain and repair escaped newlines in the winner.
pub fn extract_diagram_code(response: &str) -> Option<String> {
    first_match(&CODE_EXTRACTORS, response).map(|code| unescape_newlines(&code))
}

/// First non-empty result of `extractors` applied to `input`.
pub fn first_match(extractors: &[Extractor], input: &str) -> Option<String> {
    extractors
        .iter()
        .filter_map(|extract| extract(input))
        .map(|found| found.trim().to_string())
        .find(|found| !found.is_empty())
}

/// A fenced block explicitly tagged `mermaid`.
pub fn tagged_fence(response: &str) -> Option<String> {
    TAGGED_FENCE
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|code| !code.is_empty())
}

/// Any fenced block whose body mentions a known diagram keyword.
pub fn keyword_fence(response: &str) -> Option<String> {
    ANY_FENCE
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|code| {
            let lower = code.to_ascii_lowercase();
            DIAGRAM_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .map(str::to_string)
}

/// A JSON object carrying the code under a well-known field name.
pub fn json_code_field(response: &str) -> Option<String> {
    let value = extract_json(response)?;
    JSON_CODE_FIELDS
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::to_string)
}

/// Models sometimes emit escape sequences instead of real line breaks.
pub fn unescape_newlines(code: &str) -> String {
    code.replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\t", "    ")
        .replace("\\\"", "\"")
}

/// Parse JSON from a reply that may wrap it in a fence or in prose.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if trimmed.starts_with("```") {
        let stripped = trimmed.trim_start_matches("```json");
        let stripped = stripped.trim_start_matches("```JSON");
        let stripped = stripped.trim_start_matches("```");
        if let Some(end) = stripped.rfind("```") {
            let slice = &stripped[..end];
            if let Ok(value) = serde_json::from_str::<Value>(slice.trim()) {
                return Some(value);
            }
        }
    }

    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = trimmed.find(open)?;
            let end = trimmed.rfind(close)?;
            (start < end).then_some((start, end))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    for (start, end) in spans {
        if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            return Some(value);
        }
    }

    None
}
