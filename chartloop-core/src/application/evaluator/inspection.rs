//! Reading a yes/no verdict out of a critic reply.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::{EvaluationAnswer, EvaluationQuestion};

static VERDICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(yes|no)\b").expect("valid verdict regex"));

/// First yes/no token and the text that follows it.
pub fn parse_verdict(reply: &str) -> Option<(bool, String)> {
    let found = VERDICT.find(reply)?;
    let answer = found.as_str().eq_ignore_ascii_case("yes");
    let rest = reply[found.end()..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ':' | ';' | '-' | '!' | '*'))
        .trim()
        .to_string();
    Some((answer, rest))
}

/// Turn one critic reply into an answer for `question`.
pub fn answer_from_reply(question: &EvaluationQuestion, reply: &str) -> EvaluationAnswer {
    match parse_verdict(reply) {
        Some((true, _)) => EvaluationAnswer {
            question_id: question.id,
            answer: true,
            issue: None,
            fix: None,
        },
        Some((false, rest)) => EvaluationAnswer {
            question_id: question.id,
            answer: false,
            issue: Some(question.question.clone()),
            fix: (!rest.is_empty()).then_some(rest),
        },
        None => EvaluationAnswer {
            question_id: question.id,
            answer: false,
            issue: Some(format!("No yes/no verdict for: {}", question.question)),
            fix: None,
        },
    }
}

/// A failed inspection call counts as "no".
pub fn answer_from_failure(question: &EvaluationQuestion, error: &str) -> EvaluationAnswer {
    EvaluationAnswer {
        question_id: question.id,
        answer: false,
        issue: Some(format!("Inspection failed for: {} ({error})", question.question)),
        fix: None,
    }
}
