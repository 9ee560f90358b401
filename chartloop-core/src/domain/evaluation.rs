use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed taxonomy the critic's complaints are folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Layout,
    Overlap,
    Cutoff,
    Unreadable,
    Style,
    Other,
}

impl FeedbackCategory {
    /// Map a free-form question category onto the taxonomy.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "layout" | "layout_issue" | "structure" | "flow" | "direction" | "count"
            | "connectivity" | "fan_out" | "fan_in" => FeedbackCategory::Layout,
            "overlap" | "spacing" | "crossing" => FeedbackCategory::Overlap,
            "cutoff" | "clipping" | "truncation" => FeedbackCategory::Cutoff,
            "unreadable" | "readability" | "legibility" | "text" | "label" => {
                FeedbackCategory::Unreadable
            }
            "style" | "style_issue" | "color" | "shape" => FeedbackCategory::Style,
            _ => FeedbackCategory::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackCategory::Layout => "layout",
            FeedbackCategory::Overlap => "overlap",
            FeedbackCategory::Cutoff => "cutoff",
            FeedbackCategory::Unreadable => "unreadable",
            FeedbackCategory::Style => "style",
            FeedbackCategory::Other => "other",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A yes/no check the critic answers against the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationQuestion {
    pub id: u32,
    pub category: String,
    pub question: String,
    /// Structural feature the question targets, e.g. a fan-out pattern.
    #[serde(default)]
    pub focus: String,
}

impl EvaluationQuestion {
    pub fn new(
        id: u32,
        category: impl Into<String>,
        question: impl Into<String>,
        focus: impl Into<String>,
    ) -> Self {
        Self {
            id,
            category: category.into(),
            question: question.into(),
            focus: focus.into(),
        }
    }

    pub fn feedback_category(&self) -> FeedbackCategory {
        FeedbackCategory::from_label(&self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationAnswer {
    pub question_id: u32,
    pub answer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// Where the checklist of a round came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    Generated,
    Fallback,
}

/// Structured feedback handed to the next `revise` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFeedback {
    pub approved: bool,
    pub category: FeedbackCategory,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl VisualFeedback {
    /// Feedback describing a failure that happened before any image existed.
    pub fn from_failure(issue: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            approved: false,
            category: FeedbackCategory::Other,
            issues: vec![issue.into()],
            suggestions: vec![suggestion.into()],
        }
    }
}

/// One complete critic pass over one rendered image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRound {
    pub questions: Vec<EvaluationQuestion>,
    /// Answers in question order.
    pub answers: Vec<EvaluationAnswer>,
    pub score: f64,
    pub approved: bool,
    pub threshold: f64,
    pub source: QuestionSource,
    pub feedback: VisualFeedback,
}

impl EvaluationRound {
    pub fn question(&self, id: u32) -> Option<&EvaluationQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Multi-line report written to the log after every round.
    pub fn report(&self) -> String {
        let status = if self.approved {
            "[v] APPROVED"
        } else {
            "[x] NEEDS REVISION"
        };
        let mut out = vec![
            format!("Score: {:.2} / 1.00  {status}", self.score),
            format!("Threshold: {:.2}", self.threshold),
        ];

        for answer in &self.answers {
            let Some(question) = self.question(answer.question_id) else {
                continue;
            };
            let mark = if answer.answer { "[v]" } else { "[x]" };
            let verdict = if answer.answer { "YES" } else { "NO" };
            out.push(format!(
                "[{}] {mark} [{:<10}] {} -> {verdict}",
                question.id,
                question.category.to_uppercase(),
                truncate(&question.question, 60)
            ));
            if !answer.answer {
                if let Some(issue) = &answer.issue {
                    out.push(format!("     Issue: {}", truncate(issue, 70)));
                }
                if let Some(fix) = &answer.fix {
                    out.push(format!("     Fix:   {}", truncate(fix, 70)));
                }
            }
        }
        out.join("\n")
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}
