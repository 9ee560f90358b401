//! Mutable state of one running session: budgets, the iteration record and
//! everything that gets persisted after each transition.

use chartloop_session::{SessionError, SessionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::result::TerminalReason;
use crate::application::cancel::CancelSignal;
use crate::domain::{
    DesignSpec, DiagramArtifact, EvaluationRound, RenderOutcome, SynthesizerId, VisualFeedback,
};
use crate::infrastructure::render::{RenderBackend, RenderRequest};

/// Hard caps for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_visual_iterations: u32,
    pub max_render_attempts: u32,
}

/// Why an awaited call was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineReached,
}

/// One artifact and what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct IterationEntry {
    pub artifact: DiagramArtifact,
    pub code_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationRound>,
}

impl IterationEntry {
    pub fn rendered(&self) -> bool {
        self.render.as_ref().is_some_and(|outcome| outcome.success)
    }

    pub fn score(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|round| round.score)
    }
}

/// Ordered history of every artifact the session produced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct IterationRecord {
    entries: Vec<IterationEntry>,
}

impl IterationRecord {
    pub fn entries(&self) -> &[IterationEntry] {
        &self.entries
    }

    pub fn evaluations(&self) -> impl Iterator<Item = &EvaluationRound> {
        self.entries.iter().filter_map(|entry| entry.evaluation.as_ref())
    }

    pub fn last_evaluation(&self) -> Option<&EvaluationRound> {
        self.entries.iter().rev().find_map(|entry| entry.evaluation.as_ref())
    }

    /// Most recent entry whose render produced an image.
    pub fn latest_rendered(&self) -> Option<&IterationEntry> {
        self.entries.iter().rev().find(|entry| entry.rendered())
    }

    /// Entry a session ending with `terminal` publishes.
    ///
    /// Approval, plateau, critic failure and skipped inspection all accept
    /// the current image. Budget exhaustion and cancellation fall back to
    /// [`best`](Self::best).
    pub fn final_entry(&self, terminal: TerminalReason) -> Option<&IterationEntry> {
        match terminal {
            TerminalReason::Approved
            | TerminalReason::Plateaued
            | TerminalReason::EvaluationFailed
            | TerminalReason::InspectionSkipped => self.latest_rendered(),
            TerminalReason::BudgetExhausted
            | TerminalReason::DesignFailed
            | TerminalReason::Cancelled => self.best(),
        }
    }

    /// Highest-scoring evaluated image (the later one on ties); without any
    /// evaluation, the latest successful render.
    pub fn best(&self) -> Option<&IterationEntry> {
        let scored = self
            .entries
            .iter()
            .filter(|entry| entry.rendered())
            .filter_map(|entry| entry.score().map(|score| (score, entry)))
            .fold(None::<(f64, &IterationEntry)>, |best, (score, entry)| match best {
                Some((top, kept)) if top > score => Some((top, kept)),
                _ => Some((score, entry)),
            })
            .map(|(_, entry)| entry);

        scored.or_else(|| self.latest_rendered())
    }

    fn push(&mut self, entry: IterationEntry) {
        self.entries.push(entry);
    }

    fn entry_mut(&mut self, version: u32) -> Option<&mut IterationEntry> {
        self.entries
            .iter_mut()
            .rev()
            .find(|entry| entry.artifact.version == version)
    }
}

/// One call inside a repair run.
#[derive(Debug, Clone, Serialize)]
pub struct RepairAttempt {
    pub run: u32,
    pub attempt: u32,
    pub identity: SynthesizerId,
    pub input_error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot written to `session.json` after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionManifest {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignSpec>,
    pub iterations: IterationRecord,
    pub repairs: Vec<RepairAttempt>,
    pub feedback_history: Vec<VisualFeedback>,
    pub visual_iterations: u32,
    pub render_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalReason>,
    pub success: bool,
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_code_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_image_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Paths of a finished session's published files.
#[derive(Debug, Clone, Default)]
pub struct Publication {
    pub code_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
}

pub struct SessionContext {
    store: SessionStore,
    manifest: SessionManifest,
    limits: Limits,
    cancel: CancelSignal,
    deadline: Option<Instant>,
    next_version: u32,
    repair_runs: u32,
}

impl SessionContext {
    pub fn open(
        root: &Path,
        task: &str,
        limits: Limits,
        cancel: CancelSignal,
        session_timeout: Option<Duration>,
    ) -> Result<Self, SessionError> {
        let store = SessionStore::create(root)?;
        let manifest = SessionManifest {
            session_id: store.id().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            task: task.to_string(),
            design: None,
            iterations: IterationRecord::default(),
            repairs: Vec::new(),
            feedback_history: Vec::new(),
            visual_iterations: 0,
            render_attempts: 0,
            terminal: None,
            success: false,
            approved: false,
            final_code_path: None,
            final_image_path: None,
            last_error: None,
        };
        let mut ctx = Self {
            store,
            manifest,
            limits,
            cancel,
            deadline: session_timeout.map(|limit| Instant::now() + limit),
            next_version: 1,
            repair_runs: 0,
        };
        ctx.event(
            "session_started",
            &json!({
                "task": task,
                "max_visual_iterations": limits.max_visual_iterations,
                "max_render_attempts": limits.max_render_attempts,
            }),
        );
        ctx.persist();
        Ok(ctx)
    }

    pub fn id(&self) -> &str {
        self.store.id()
    }

    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn manifest(&self) -> &SessionManifest {
        &self.manifest
    }

    pub fn record(&self) -> &IterationRecord {
        &self.manifest.iterations
    }

    pub fn visual_iterations(&self) -> u32 {
        self.manifest.visual_iterations
    }

    pub fn render_attempts(&self) -> u32 {
        self.manifest.render_attempts
    }

    pub fn render_budget_left(&self) -> bool {
        self.manifest.render_attempts < self.limits.max_render_attempts
    }

    pub fn visual_budget_left(&self) -> bool {
        self.manifest.visual_iterations < self.limits.max_visual_iterations
    }

    pub fn next_version(&mut self) -> u32 {
        let version = self.next_version;
        self.next_version += 1;
        version
    }

    /// Await `fut` unless the session is cancelled or its deadline passes first.
    pub async fn interruptible<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineReached),
            output = fut => Ok(output),
        }
    }

    pub fn set_design(&mut self, design: &DesignSpec) {
        self.event(
            "design",
            &json!({
                "kind": design.kind,
                "nodes": design.node_count(),
                "edges": design.edge_count(),
            }),
        );
        self.manifest.design = Some(design.clone());
        self.persist();
    }

    /// Persist the code of a new artifact and open its record entry.
    pub fn record_artifact(&mut self, artifact: &DiagramArtifact) {
        let code_file = artifact.file_name();
        if let Err(err) = self.store.write_text(&code_file, &artifact.code) {
            warn!(error = %err, file = code_file.as_str(), "Failed to store diagram code");
        }
        self.event(
            "artifact",
            &json!({
                "version": artifact.version,
                "producer": artifact.producer,
                "origin": artifact.origin,
                "file": code_file,
                "lines": artifact.code.lines().count(),
            }),
        );
        self.manifest.iterations.push(IterationEntry {
            artifact: artifact.clone(),
            code_file,
            render_attempt: None,
            render: None,
            evaluation: None,
        });
        self.persist();
    }

    /// Render `artifact`, charging one attempt to the session budget.
    ///
    /// Returns `Ok(None)` without calling the renderer when the budget is spent.
    pub async fn render<R: RenderBackend + ?Sized>(
        &mut self,
        renderer: &R,
        artifact: &DiagramArtifact,
    ) -> Result<Option<RenderOutcome>, Interrupted> {
        if !self.render_budget_left() {
            info!(
                attempts = self.manifest.render_attempts,
                "Render budget spent, not rendering"
            );
            return Ok(None);
        }
        self.manifest.render_attempts += 1;
        let attempt = self.manifest.render_attempts;
        let request = RenderRequest::new(
            artifact.code.clone(),
            self.store.dir().to_path_buf(),
            format!("render_{attempt:03}_v{:03}", artifact.version),
        );

        let outcome = self.interruptible(renderer.render(request)).await?;
        info!(
            attempt,
            version = artifact.version,
            success = outcome.success,
            elapsed_ms = outcome.elapsed_ms,
            "Render finished"
        );
        self.event(
            "render",
            &json!({
                "attempt": attempt,
                "version": artifact.version,
                "success": outcome.success,
                "image": outcome.image.as_ref().map(|image| &image.path),
                "error": outcome.error,
                "raw_error": outcome.raw_error,
                "elapsed_ms": outcome.elapsed_ms,
            }),
        );
        if let Some(entry) = self.manifest.iterations.entry_mut(artifact.version) {
            entry.render_attempt = Some(attempt);
            entry.render = Some(outcome.clone());
        }
        if !outcome.success {
            self.manifest.last_error = Some(outcome.error_message().to_string());
        }
        self.persist();
        Ok(Some(outcome))
    }

    /// A synthesizer call that produced nothing still costs one render slot.
    pub fn record_synthesis_failure(&mut self, error: &str, feedback: &VisualFeedback) {
        self.manifest.render_attempts += 1;
        self.manifest.last_error = Some(error.to_string());
        self.manifest.feedback_history.push(feedback.clone());
        self.event(
            "synthesis_failed",
            &json!({
                "render_attempts": self.manifest.render_attempts,
                "error": error,
            }),
        );
        self.persist();
    }

    pub fn record_visual_iteration(&mut self, version: u32) {
        self.manifest.visual_iterations += 1;
        self.event(
            "visual_iteration",
            &json!({
                "iteration": self.manifest.visual_iterations,
                "version": version,
            }),
        );
        self.persist();
    }

    pub fn record_feedback(&mut self, feedback: &VisualFeedback) {
        self.manifest.feedback_history.push(feedback.clone());
        self.event("feedback", feedback);
        self.persist();
    }

    pub fn record_evaluation(&mut self, version: u32, round: &EvaluationRound) {
        self.event(
            "evaluation",
            &json!({
                "version": version,
                "score": round.score,
                "approved": round.approved,
                "threshold": round.threshold,
                "source": round.source,
                "questions": round.questions,
                "answers": round.answers,
            }),
        );
        if let Some(entry) = self.manifest.iterations.entry_mut(version) {
            entry.evaluation = Some(round.clone());
        }
        self.manifest.feedback_history.push(round.feedback.clone());
        self.persist();
    }

    /// Start a new ping-pong run and return its number.
    pub fn begin_repair_run(&mut self, error: &str) -> u32 {
        self.repair_runs += 1;
        self.event(
            "repair_started",
            &json!({ "run": self.repair_runs, "error": error }),
        );
        self.repair_runs
    }

    pub fn record_repair(&mut self, attempt: RepairAttempt) {
        self.event("repair_attempt", &attempt);
        self.manifest.repairs.push(attempt);
        self.persist();
    }

    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.manifest.last_error = Some(error.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.manifest.last_error.as_deref()
    }

    pub fn note(&mut self, kind: &str, payload: &serde_json::Value) {
        self.event(kind, payload);
    }

    /// Stamp the terminal state and write the final manifest.
    pub fn finish(
        &mut self,
        terminal: TerminalReason,
        success: bool,
        publication: &Publication,
    ) -> PathBuf {
        self.manifest.terminal = Some(terminal);
        self.manifest.success = success;
        self.manifest.approved = terminal == TerminalReason::Approved;
        self.manifest.finished_at = Some(Utc::now());
        self.manifest.final_code_path = publication.code_path.clone();
        self.manifest.final_image_path = publication.image_path.clone();
        self.event(
            "session_finished",
            &json!({
                "terminal": terminal,
                "success": success,
                "visual_iterations": self.manifest.visual_iterations,
                "render_attempts": self.manifest.render_attempts,
                "last_error": self.manifest.last_error,
            }),
        );
        self.persist();
        self.store.manifest_path()
    }

    fn event<T: Serialize + ?Sized>(&mut self, kind: &str, payload: &T) {
        if let Err(err) = self.store.append_event(kind, &payload) {
            warn!(error = %err, kind, "Failed to append session event");
        }
    }

    fn persist(&self) {
        match self.store.write_manifest(&self.manifest) {
            Ok(path) => debug!(path = %path.display(), "Manifest updated"),
            Err(err) => warn!(error = %err, "Failed to write session manifest"),
        }
    }
}
