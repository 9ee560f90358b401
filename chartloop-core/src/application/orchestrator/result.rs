use chartloop_session::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{DiagramArtifact, SynthesizerId};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Approved,
    Plateaued,
    BudgetExhausted,
    DesignFailed,
    EvaluationFailed,
    InspectionSkipped,
    Cancelled,
}

impl TerminalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalReason::Approved => "approved",
            TerminalReason::Plateaued => "plateaued",
            TerminalReason::BudgetExhausted => "budget_exhausted",
            TerminalReason::DesignFailed => "design_failed",
            TerminalReason::EvaluationFailed => "evaluation_failed",
            TerminalReason::InspectionSkipped => "inspection_skipped",
            TerminalReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one session hands back to its caller.
///
/// `success` means an image was produced; `approved` means the critic
/// accepted it. The two are independent: a plateaued or budget-exhausted
/// session can succeed without approval.
#[derive(Debug, Clone, Serialize)]
pub struct ChartOutcome {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub success: bool,
    pub approved: bool,
    pub terminal: TerminalReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<DiagramArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_path: Option<PathBuf>,
    pub visual_iterations: u32,
    pub render_attempts: u32,
    /// Identity of every repair attempt, in order
    pub repair_identities: Vec<SynthesizerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub manifest_path: PathBuf,
}

/// Raised only when the session directory cannot be set up.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("failed to open session under {root:?}: {source}")]
    Session {
        root: PathBuf,
        #[source]
        source: SessionError,
    },
}

/// Caller-facing description of one request.
#[derive(Debug, Clone, Default)]
pub struct ChartRequest {
    /// Free text kept for the log; never drives control flow
    pub task: String,
    /// Base name of the published files
    pub output_name: Option<String>,
}

impl ChartRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            output_name: None,
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}
