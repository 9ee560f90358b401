//! Score, approval and structured feedback for one evaluation round.

use crate::domain::{EvaluationAnswer, EvaluationQuestion, FeedbackCategory, VisualFeedback};

pub const GENERIC_SUGGESTIONS: [&str; 3] = [
    "Reorganize layout to follow top-to-bottom flow",
    "Reduce crossing edges",
    "Group related nodes together",
];

/// Share of "yes" answers, in `[0, 1]`.
pub fn score(answers: &[EvaluationAnswer]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let yes = answers.iter().filter(|a| a.answer).count();
    yes as f64 / answers.len() as f64
}

pub fn is_approved(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Collect issues and fixes of every "no" answer.
///
/// The category is that of the last failed question; generic layout advice
/// stands in when no failed question came with a fix.
pub fn build_feedback(
    questions: &[EvaluationQuestion],
    answers: &[EvaluationAnswer],
    approved: bool,
) -> VisualFeedback {
    let mut category = FeedbackCategory::Layout;
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();

    for answer in answers.iter().filter(|a| !a.answer) {
        let question = questions.iter().find(|q| q.id == answer.question_id);
        if let Some(issue) = answer
            .issue
            .clone()
            .or_else(|| question.map(|q| q.question.clone()))
        {
            issues.push(issue);
        }
        if let Some(fix) = &answer.fix {
            suggestions.push(fix.clone());
        }
        if let Some(question) = question {
            category = question.feedback_category();
        }
    }

    if suggestions.is_empty() && !approved {
        suggestions = GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
    }

    VisualFeedback {
        approved,
        category,
        issues,
        suggestions,
    }
}
