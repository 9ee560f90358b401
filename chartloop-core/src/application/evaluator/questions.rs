//! Checklist of yes/no visual questions for one diagram.

use serde_json::Value;

use crate::application::extract::extract_json;
use crate::domain::{DesignSpec, EvaluationQuestion};

pub const MIN_QUESTIONS: usize = 4;
pub const MAX_QUESTIONS: usize = 10;

/// Parse a generated checklist. `None` when fewer than the minimum survive.
pub fn parse_questions(reply: &str) -> Option<Vec<EvaluationQuestion>> {
    let value = extract_json(reply)?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("questions")
            .or_else(|| map.get("evaluations"))
            .and_then(Value::as_array)?,
        _ => return None,
    };

    let questions: Vec<EvaluationQuestion> = items
        .iter()
        .filter_map(|item| {
            let text = match item {
                Value::String(text) => text.as_str(),
                _ => item.get("question").and_then(Value::as_str)?,
            };
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            let category = item
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or("other");
            let focus = item.get("focus").and_then(Value::as_str).unwrap_or_default();
            Some((category.to_string(), text.to_string(), focus.to_string()))
        })
        .take(MAX_QUESTIONS)
        .enumerate()
        .map(|(idx, (category, text, focus))| {
            EvaluationQuestion::new(idx as u32 + 1, category, text, focus)
        })
        .collect();

    (questions.len() >= MIN_QUESTIONS).then_some(questions)
}

/// Generic checks plus checks derived from the design itself.
pub fn fallback_questions(spec: &DesignSpec) -> Vec<EvaluationQuestion> {
    let mut drafts: Vec<(&str, String, String)> = vec![
        (
            "overlap",
            "Are all nodes, labels and arrows free of overlap, with clear spacing between them?"
                .to_string(),
            "spacing".to_string(),
        ),
        (
            "unreadable",
            "Is every text label fully legible at normal zoom?".to_string(),
            "legibility".to_string(),
        ),
        (
            "layout",
            format!("Does the overall flow run {}?", spec.direction.describe()),
            "direction".to_string(),
        ),
        (
            "cutoff",
            "Is every element fully visible, with nothing cut off at the image edges?".to_string(),
            "cutoff".to_string(),
        ),
        (
            "structure",
            format!("Does the diagram show exactly {} nodes?", spec.node_count()),
            "node count".to_string(),
        ),
    ];

    let decisions = spec.decision_count();
    if decisions > 0 {
        drafts.push((
            "structure",
            format!("Are there exactly {decisions} decision (diamond-shaped) nodes?"),
            "decision count".to_string(),
        ));
    }

    for fan in spec.adjacency().fan_out {
        drafts.push((
            "structure",
            format!(
                "Does \"{}\" have {} distinct arrows leaving it, one to each of {}?",
                fan.label,
                fan.peers.len(),
                fan.peers.join(", ")
            ),
            format!("fan-out from {} renders as {} distinct arrows", fan.node, fan.peers.len()),
        ));
    }

    drafts
        .into_iter()
        .take(MAX_QUESTIONS)
        .enumerate()
        .map(|(idx, (category, question, focus))| {
            EvaluationQuestion::new(idx as u32 + 1, category, question, focus)
        })
        .collect()
}
