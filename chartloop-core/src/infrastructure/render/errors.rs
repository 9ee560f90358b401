//! Short error lines from renderer output.

use regex::Regex;
use std::sync::LazyLock;

/// Longest error line handed back to the coders.
pub const MAX_ERROR_CHARS: usize = 100;

static ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)Error:\s*(\S.*?)\s*$").expect("valid error regex"));
static EXPECTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)Expecting\s+(.+?),?\s+got\s+(\S+?)\s*$").expect("valid expecting regex")
});
static PARSE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)parse error on line\s+(\d+)").expect("valid parse-line regex")
});

/// Reduce raw renderer output to one human-meaningful line.
///
/// Tried in order: an explicit `Error: ...` line, an `Expecting X got Y`
/// syntax complaint, a line-numbered parse error, the first non-empty line.
pub fn extract_error_line(raw: &str) -> String {
    let extractors: [fn(&str) -> Option<String>; 4] =
        [error_line, expecting_line, parse_line, first_line];
    let line = extractors
        .iter()
        .find_map(|extract| extract(raw))
        .unwrap_or_else(|| "Unknown error".to_string());
    truncate(&line, MAX_ERROR_CHARS)
}

fn error_line(raw: &str) -> Option<String> {
    let found = ERROR_LINE.captures(raw)?.get(1)?.as_str().trim();
    // "Parse error on line 3:" says little by itself; keep what was expected.
    if PARSE_LINE.is_match(found) {
        if let Some(detail) = expecting_line(raw) {
            return Some(format!("{}: {detail}", found.trim_end_matches(':')));
        }
    }
    Some(found.to_string())
}

fn expecting_line(raw: &str) -> Option<String> {
    let caps = EXPECTING.captures(raw)?;
    let expected = caps.get(1)?.as_str().trim().trim_end_matches(',');
    let got = caps.get(2)?.as_str();
    Some(format!("Expecting {expected}, got {got}"))
}

fn parse_line(raw: &str) -> Option<String> {
    let caps = PARSE_LINE.captures(raw)?;
    Some(format!("Parse error on line {}", caps.get(1)?.as_str()))
}

fn first_line(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
