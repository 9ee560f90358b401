//! Detecting that two evaluation rounds complain about the same thing.

use std::collections::HashSet;

fn tokens(issues: &[String]) -> HashSet<String> {
    issues
        .join(" ")
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// `|A ∩ B| / max(|A|, |B|)` over lower-cased whitespace tokens; `None` when
/// either side has no tokens.
pub fn issue_overlap(previous: &[String], current: &[String]) -> Option<f64> {
    let a = tokens(previous);
    let b = tokens(current);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let shared = a.intersection(&b).count();
    Some(shared as f64 / a.len().max(b.len()) as f64)
}

/// True when the overlap strictly exceeds `threshold`.
pub fn is_plateau(previous: &[String], current: &[String], threshold: f64) -> bool {
    issue_overlap(previous, current).is_some_and(|overlap| overlap > threshold)
}
