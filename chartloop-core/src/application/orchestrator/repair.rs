//! Ping-pong repair: the two synthesizers take turns fixing code the
//! renderer rejected, each one seeing the latest broken version.

use tracing::{info, warn};

use super::context::{Interrupted, RepairAttempt, SessionContext};
use crate::application::synthesizer::Synthesizer;
use crate::domain::{DesignSpec, DiagramArtifact, RenderedImage, SynthesizerId};
use crate::infrastructure::model::ModelProvider;
use crate::infrastructure::render::RenderBackend;

/// Both synthesizer identities of a session.
pub struct CoderPair<P> {
    pub a: Synthesizer<P>,
    pub b: Synthesizer<P>,
}

impl<P: ModelProvider> CoderPair<P> {
    pub fn get(&self, id: SynthesizerId) -> &Synthesizer<P> {
        match id {
            SynthesizerId::A => &self.a,
            SynthesizerId::B => &self.b,
        }
    }
}

/// Result of one repair run.
#[derive(Debug, Clone)]
pub struct RepairResult {
    pub fixed: Option<(DiagramArtifact, RenderedImage)>,
    /// Identity of every attempt, in order
    pub identities: Vec<SynthesizerId>,
    /// Renderer error of the last broken version
    pub last_error: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RepairProtocol {
    max_attempts: u32,
}

impl RepairProtocol {
    /// At most `max_attempts` repair calls per run, alternating A and B.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Alternate A, B, A, B... until a repaired version renders, the attempt
    /// cap is hit, or the session's render budget runs out.
    pub async fn run<P, R>(
        &self,
        coders: &CoderPair<P>,
        renderer: &R,
        ctx: &mut SessionContext,
        spec: &DesignSpec,
        broken: &DiagramArtifact,
        error: &str,
    ) -> Result<RepairResult, Interrupted>
    where
        P: ModelProvider,
        R: RenderBackend + ?Sized,
    {
        let run = ctx.begin_repair_run(error);
        let mut broken_code = broken.code.clone();
        let mut current_error = error.to_string();
        let mut identity = SynthesizerId::A;
        let mut identities = Vec::new();

        for attempt in 1..=self.max_attempts {
            if !ctx.render_budget_left() {
                info!(run, attempt, "Render budget spent, ending repair run");
                break;
            }
            identities.push(identity);
            let mut record = RepairAttempt {
                run,
                attempt,
                identity,
                input_error: current_error.clone(),
                artifact_version: None,
                render_success: None,
                error: None,
            };

            let version = ctx.next_version();
            let repaired = ctx
                .interruptible(coders.get(identity).repair(spec, &broken_code, &current_error, version))
                .await?;

            let artifact = match repaired {
                Ok(artifact) => artifact,
                Err(err) => {
                    warn!(run, attempt, identity = %identity, error = %err, "Repair produced nothing usable");
                    record.error = Some(err.to_string());
                    ctx.record_repair(record);
                    identity = identity.other();
                    continue;
                }
            };

            ctx.record_artifact(&artifact);
            record.artifact_version = Some(artifact.version);
            let Some(outcome) = ctx.render(renderer, &artifact).await? else {
                ctx.record_repair(record);
                break;
            };
            record.render_success = Some(outcome.success);

            if let (true, Some(image)) = (outcome.success, outcome.image.clone()) {
                info!(run, attempt, identity = %identity, version = artifact.version, "Repair rendered");
                ctx.record_repair(record);
                return Ok(RepairResult {
                    fixed: Some((artifact, image)),
                    identities,
                    last_error: current_error,
                });
            }

            current_error = outcome.error_message().to_string();
            record.error = Some(current_error.clone());
            ctx.record_repair(record);
            broken_code = artifact.code;
            identity = identity.other();
        }

        warn!(run, attempts = identities.len(), error = current_error.as_str(), "Repair run failed");
        Ok(RepairResult {
            fixed: None,
            identities,
            last_error: current_error,
        })
    }
}
