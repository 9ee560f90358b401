//! The bounded revise loop.
//!
//! One [`ChartLoop::run`] call drives a session through
//! `synthesize -> render -> (repair) -> evaluate` until the critic approves,
//! improvement stalls, a budget runs out, or the caller cancels. Every
//! transition is appended to the session's event log before the next one
//! starts.

mod context;
mod repair;
mod result;

pub use context::{
    Interrupted, IterationEntry, IterationRecord, Limits, Publication, RepairAttempt,
    SessionContext, SessionManifest,
};
pub use repair::{CoderPair, RepairProtocol, RepairResult};
pub use result::{ChartOutcome, ChartRequest, LoopError, TerminalReason};

use chartloop_session::{SessionError, publish_file};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::cancel::CancelSignal;
use crate::application::evaluator::{EvaluatorConfig, VisualEvaluator};
use crate::application::plateau::is_plateau;
use crate::application::structure::{FixedStructure, StructureProvider};
use crate::application::synthesizer::{Synthesizer, SynthesizerConfig};
use crate::config::{AppConfig, LoopConfig, PathsConfig};
use crate::constants::{DEFAULT_OUTPUT_NAME, FINAL_CODE_FILE};
use crate::domain::{DesignSpec, DiagramArtifact, RenderedImage, SynthesizerId, VisualFeedback};
use crate::infrastructure::model::ModelProvider;
use crate::infrastructure::render::RenderBackend;

const SIMPLIFY_STRUCTURE: &str = "Simplify the structure";
const FIX_SYNTAX: &str = "Fix syntax error";
const SIMPLIFY_SIGNIFICANTLY: &str = "Simplify diagram significantly";

/// Next thing the loop will do.
enum Step {
    Synthesize,
    Render(DiagramArtifact),
    Repair {
        broken: DiagramArtifact,
        error: String,
    },
    Evaluate {
        artifact: DiagramArtifact,
        image: RenderedImage,
    },
    Done(TerminalReason),
}

/// What the next synthesize call builds on.
#[derive(Default)]
struct Cursor {
    current: Option<DiagramArtifact>,
    feedback: Option<VisualFeedback>,
}

pub struct ChartLoop<P, R> {
    coders: CoderPair<Arc<P>>,
    evaluator: VisualEvaluator<Arc<P>>,
    renderer: R,
    repair_protocol: RepairProtocol,
    settings: LoopConfig,
    paths: PathsConfig,
}

impl<P, R> ChartLoop<P, R>
where
    P: ModelProvider,
    R: RenderBackend,
{
    pub fn new(provider: P, renderer: R, config: &AppConfig) -> Self {
        let provider = Arc::new(provider);
        let settings = config.loop_config.clone();
        let timeout = settings.llm_timeout();
        let agents = &config.agents;

        let coders = CoderPair {
            a: Synthesizer::new(
                SynthesizerConfig::from_agent(SynthesizerId::A, &agents.coder_a, timeout),
                Arc::clone(&provider),
            ),
            b: Synthesizer::new(
                SynthesizerConfig::from_agent(SynthesizerId::B, &agents.coder_b, timeout),
                Arc::clone(&provider),
            ),
        };
        let evaluator = VisualEvaluator::new(
            EvaluatorConfig::from_agent(&agents.evaluator, timeout, settings.approval_threshold),
            provider,
        );

        Self {
            coders,
            evaluator,
            renderer,
            repair_protocol: RepairProtocol::new(settings.max_repair_attempts()),
            settings,
            paths: config.paths.clone(),
        }
    }

    pub fn settings(&self) -> &LoopConfig {
        &self.settings
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn limits(&self) -> Limits {
        Limits {
            max_visual_iterations: self.settings.max_visual_iterations,
            max_render_attempts: self.settings.max_render_attempts(),
        }
    }

    /// Run a session for an already known design.
    pub async fn run_design(
        &self,
        design: DesignSpec,
        request: &ChartRequest,
        cancel: CancelSignal,
    ) -> Result<ChartOutcome, LoopError> {
        self.run(&FixedStructure(design), request, cancel).await
    }

    /// Run one complete session.
    ///
    /// Only failing to create the session directory is an error; every
    /// other outcome is described by the returned [`ChartOutcome`].
    pub async fn run<S>(
        &self,
        structure: &S,
        request: &ChartRequest,
        cancel: CancelSignal,
    ) -> Result<ChartOutcome, LoopError>
    where
        S: StructureProvider + ?Sized,
    {
        let root = &self.paths.log_dir;
        let mut ctx = SessionContext::open(
            root,
            &request.task,
            self.limits(),
            cancel,
            self.settings.session_timeout(),
        )
        .map_err(|source| LoopError::Session {
            root: root.clone(),
            source,
        })?;
        info!(
            session = ctx.id(),
            dir = %ctx.dir().display(),
            max_visual_iterations = self.settings.max_visual_iterations,
            max_render_attempts = self.settings.max_render_attempts(),
            "Chart session started"
        );

        let design = match ctx.interruptible(structure.design(&request.task)).await {
            Ok(Ok(design)) => design,
            Ok(Err(err)) => {
                warn!(error = %err, "No usable design");
                ctx.set_last_error(format!("Design failed: {err}"));
                return Ok(self.finish(ctx, TerminalReason::DesignFailed, request));
            }
            Err(interrupted) => {
                ctx.set_last_error(interrupted_message(interrupted));
                return Ok(self.finish(ctx, TerminalReason::Cancelled, request));
            }
        };
        ctx.set_design(&design);

        let terminal = self.drive(&mut ctx, &design).await;
        Ok(self.finish(ctx, terminal, request))
    }

    async fn drive(&self, ctx: &mut SessionContext, spec: &DesignSpec) -> TerminalReason {
        let mut cursor = Cursor::default();
        let mut step = Step::Synthesize;
        loop {
            let next = match step {
                Step::Synthesize => self.synthesize(ctx, spec, &mut cursor).await,
                Step::Render(artifact) => self.render(ctx, &mut cursor, artifact).await,
                Step::Repair { broken, error } => {
                    self.repair(ctx, spec, &mut cursor, broken, error).await
                }
                Step::Evaluate { artifact, image } => {
                    self.evaluate(ctx, spec, &mut cursor, artifact, image).await
                }
                Step::Done(reason) => return reason,
            };
            step = next.unwrap_or_else(|interrupted| {
                info!(reason = interrupted_message(interrupted), "Session interrupted");
                ctx.set_last_error(interrupted_message(interrupted));
                Step::Done(TerminalReason::Cancelled)
            });
        }
    }

    async fn synthesize(
        &self,
        ctx: &mut SessionContext,
        spec: &DesignSpec,
        cursor: &mut Cursor,
    ) -> Result<Step, Interrupted> {
        if !ctx.visual_budget_left() || !ctx.render_budget_left() {
            info!(
                visual_iterations = ctx.visual_iterations(),
                render_attempts = ctx.render_attempts(),
                "Budget exhausted"
            );
            return Ok(Step::Done(TerminalReason::BudgetExhausted));
        }

        let version = ctx.next_version();
        let coder = &self.coders.a;
        let produced = match (&cursor.current, &cursor.feedback) {
            (Some(current), Some(feedback)) => {
                ctx.interruptible(coder.revise(spec, &current.code, feedback, version))
                    .await?
            }
            _ => ctx.interruptible(coder.generate(spec, version)).await?,
        };

        match produced {
            Ok(artifact) => {
                ctx.record_artifact(&artifact);
                cursor.current = Some(artifact.clone());
                Ok(Step::Render(artifact))
            }
            Err(err) => {
                warn!(error = %err, "Synthesis failed");
                let message = format!("Code error: {err}");
                let feedback = VisualFeedback::from_failure(message.as_str(), SIMPLIFY_STRUCTURE);
                ctx.record_synthesis_failure(&message, &feedback);
                cursor.feedback = Some(feedback);
                Ok(Step::Synthesize)
            }
        }
    }

    async fn render(
        &self,
        ctx: &mut SessionContext,
        cursor: &mut Cursor,
        artifact: DiagramArtifact,
    ) -> Result<Step, Interrupted> {
        let Some(outcome) = ctx.render(&self.renderer, &artifact).await? else {
            return Ok(Step::Done(TerminalReason::BudgetExhausted));
        };

        match (outcome.success, outcome.image) {
            (true, Some(image)) => Ok(self.rendered(ctx, artifact, image)),
            _ => {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string());
                if self.settings.use_dual_coder {
                    return Ok(Step::Repair {
                        broken: artifact,
                        error,
                    });
                }
                let feedback = VisualFeedback::from_failure(error, FIX_SYNTAX);
                ctx.record_feedback(&feedback);
                cursor.feedback = Some(feedback);
                Ok(Step::Synthesize)
            }
        }
    }

    async fn repair(
        &self,
        ctx: &mut SessionContext,
        spec: &DesignSpec,
        cursor: &mut Cursor,
        broken: DiagramArtifact,
        error: String,
    ) -> Result<Step, Interrupted> {
        let result = self
            .repair_protocol
            .run(&self.coders, &self.renderer, ctx, spec, &broken, &error)
            .await?;

        match result.fixed {
            Some((artifact, image)) => {
                cursor.current = Some(artifact.clone());
                Ok(self.rendered(ctx, artifact, image))
            }
            None => {
                ctx.set_last_error(result.last_error);
                let feedback = VisualFeedback::from_failure(error, SIMPLIFY_SIGNIFICANTLY);
                ctx.record_feedback(&feedback);
                cursor.feedback = Some(feedback);
                Ok(Step::Synthesize)
            }
        }
    }

    /// A new image exists; count it and decide whether to inspect it.
    fn rendered(
        &self,
        ctx: &mut SessionContext,
        artifact: DiagramArtifact,
        image: RenderedImage,
    ) -> Step {
        ctx.record_visual_iteration(artifact.version);
        if self.settings.skip_inspection {
            info!(version = artifact.version, "Inspection disabled, keeping first image");
            return Step::Done(TerminalReason::InspectionSkipped);
        }
        Step::Evaluate { artifact, image }
    }

    async fn evaluate(
        &self,
        ctx: &mut SessionContext,
        spec: &DesignSpec,
        cursor: &mut Cursor,
        artifact: DiagramArtifact,
        image: RenderedImage,
    ) -> Result<Step, Interrupted> {
        let evaluated = ctx
            .interruptible(self.evaluator.evaluate(spec, &image))
            .await?;

        let round = match evaluated {
            Ok(round) => round,
            Err(err) => {
                warn!(error = %err, version = artifact.version, "Evaluation failed");
                ctx.set_last_error(format!("Evaluation failed: {err}"));
                ctx.note(
                    "evaluation_failed",
                    &json!({ "version": artifact.version, "error": err.to_string() }),
                );
                return Ok(Step::Done(TerminalReason::EvaluationFailed));
            }
        };

        let previous_issues = ctx
            .record()
            .last_evaluation()
            .map(|round| round.feedback.issues.clone());
        ctx.record_evaluation(artifact.version, &round);
        info!(version = artifact.version, "Evaluation report\n{}", round.report());

        if round.approved {
            return Ok(Step::Done(TerminalReason::Approved));
        }
        if let Some(previous) = previous_issues {
            if is_plateau(&previous, &round.feedback.issues, self.settings.plateau_threshold) {
                info!(score = round.score, "Issues repeat, stopping at plateau");
                return Ok(Step::Done(TerminalReason::Plateaued));
            }
        }

        cursor.current = Some(artifact);
        cursor.feedback = Some(round.feedback);
        Ok(Step::Synthesize)
    }

    /// Pick the image `terminal` accepts, publish it and close the session.
    fn finish(
        &self,
        mut ctx: SessionContext,
        terminal: TerminalReason,
        request: &ChartRequest,
    ) -> ChartOutcome {
        let chosen = ctx.record().final_entry(terminal).cloned();
        let image = chosen
            .as_ref()
            .and_then(|entry| entry.render.as_ref())
            .and_then(|outcome| outcome.image.clone());

        let mut publication = Publication::default();
        if let (Some(entry), Some(image)) = (&chosen, &image) {
            match self.publish(&ctx, &entry.artifact, image, request.output_name.as_deref()) {
                Ok(published) => publication = published,
                Err(err) => {
                    warn!(error = %err, "Failed to publish final diagram");
                    ctx.set_last_error(format!("Publishing failed: {err}"));
                    publication.image_path = Some(image.path.clone());
                }
            }
        }

        let success = image.is_some();
        let manifest_path = ctx.finish(terminal, success, &publication);
        let manifest = ctx.manifest();
        info!(
            session = ctx.id(),
            terminal = terminal.as_str(),
            success,
            visual_iterations = manifest.visual_iterations,
            render_attempts = manifest.render_attempts,
            "Chart session finished"
        );

        ChartOutcome {
            session_id: ctx.id().to_string(),
            session_dir: ctx.dir().to_path_buf(),
            success,
            approved: terminal == TerminalReason::Approved,
            terminal,
            score: chosen.as_ref().and_then(|entry| entry.score()),
            artifact: chosen.map(|entry| entry.artifact),
            image_path: publication.image_path,
            code_path: publication.code_path,
            visual_iterations: manifest.visual_iterations,
            render_attempts: manifest.render_attempts,
            repair_identities: manifest.repairs.iter().map(|attempt| attempt.identity).collect(),
            last_error: manifest.last_error.clone(),
            manifest_path,
        }
    }

    /// Write `final.*` into the session directory and copy both files to
    /// the output directory.
    fn publish(
        &self,
        ctx: &SessionContext,
        artifact: &DiagramArtifact,
        image: &RenderedImage,
        output_name: Option<&str>,
    ) -> Result<Publication, SessionError> {
        let extension = image
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_else(|| self.renderer.image_extension())
            .to_string();
        let store = ctx.store();
        let session_code = store.write_text(FINAL_CODE_FILE, &artifact.code)?;
        let session_image = store.copy_into(&image.path, &format!("final.{extension}"))?;

        let name = output_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_NAME);
        let code_path = self.paths.output_dir.join(format!("{name}.mmd"));
        let image_path = self.paths.output_dir.join(format!("{name}.{extension}"));
        publish_file(&session_code, &code_path)?;
        publish_file(&session_image, &image_path)?;

        info!(
            code = %code_path.display(),
            image = %image_path.display(),
            version = artifact.version,
            "Published final diagram"
        );
        Ok(Publication {
            code_path: Some(code_path),
            image_path: Some(image_path),
        })
    }
}

fn interrupted_message(interrupted: Interrupted) -> &'static str {
    match interrupted {
        Interrupted::Cancelled => "Cancelled",
        Interrupted::DeadlineReached => "Session deadline reached",
    }
}
