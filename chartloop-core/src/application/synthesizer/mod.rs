//! Stateless diagram-code synthesizer.
//!
//! Two identities (A and B) exist; they are the same type and differ only by
//! the agent configuration they were built from.

mod error;

pub use error::SynthesisError;

use std::time::Duration;
use tracing::{debug, info};

use crate::application::extract::extract_diagram_code;
use crate::config::AgentConfig;
use crate::domain::types::ChatMessage;
use crate::domain::{
    ArtifactOrigin, DesignSpec, DiagramArtifact, DiagramKind, SynthesizerId, VisualFeedback,
};
use crate::infrastructure::model::{ModelProvider, ModelRequest, call_with_timeout};
use crate::templates::{
    CODER_SYSTEM_MD, GENERATE_MD, REPAIR_MD, REVISE_MD, bullets, fill,
};

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    pub id: SynthesizerId,
    pub provider: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub timeout: Duration,
}

impl SynthesizerConfig {
    pub fn from_agent(id: SynthesizerId, agent: &AgentConfig, timeout: Duration) -> Self {
        Self {
            id,
            provider: agent.provider.clone(),
            model: agent.model.clone(),
            temperature: agent.temperature,
            seed: agent.seed,
            timeout,
        }
    }
}

pub struct Synthesizer<P> {
    config: SynthesizerConfig,
    provider: P,
}

impl<P: ModelProvider> Synthesizer<P> {
    pub fn new(config: SynthesizerConfig, provider: P) -> Self {
        Self { config, provider }
    }

    pub fn id(&self) -> SynthesizerId {
        self.config.id
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// First draft from the design alone.
    pub async fn generate(
        &self,
        spec: &DesignSpec,
        version: u32,
    ) -> Result<DiagramArtifact, SynthesisError> {
        let structure = spec.to_prompt_json();
        let adjacency = spec.adjacency().describe();
        let header = match spec.kind {
            DiagramKind::Flowchart => format!("{} {}", spec.kind.header(), spec.direction.as_str()),
            other => other.header().to_string(),
        };
        let prompt = fill(
            GENERATE_MD,
            &[
                ("diagram_type", spec.kind.as_str()),
                ("header", header.as_str()),
                ("direction_hint", spec.direction.describe()),
                ("structure", structure.as_str()),
                ("adjacency", adjacency.as_str()),
            ],
        );
        let code = self.ask(prompt, "generate").await?;
        Ok(self.artifact(spec, code, version, ArtifactOrigin::Generate))
    }

    /// New version of `previous_code` addressing `feedback`.
    pub async fn revise(
        &self,
        spec: &DesignSpec,
        previous_code: &str,
        feedback: &VisualFeedback,
        version: u32,
    ) -> Result<DiagramArtifact, SynthesisError> {
        let structure = spec.to_prompt_json();
        let issues = bullets(&feedback.issues);
        let suggestions = bullets(&feedback.suggestions);
        let prompt = fill(
            REVISE_MD,
            &[
                ("structure", structure.as_str()),
                ("previous_code", previous_code),
                ("feedback_type", feedback.category.as_str()),
                ("issues", issues.as_str()),
                ("suggestions", suggestions.as_str()),
            ],
        );
        let code = self.ask(prompt, "revise").await?;
        Ok(self.artifact(spec, code, version, ArtifactOrigin::Revise))
    }

    /// Fix code the renderer rejected. Output equal to `broken_code` is an error.
    pub async fn repair(
        &self,
        spec: &DesignSpec,
        broken_code: &str,
        error_message: &str,
        version: u32,
    ) -> Result<DiagramArtifact, SynthesisError> {
        let structure = spec.to_prompt_json();
        let prompt = fill(
            REPAIR_MD,
            &[
                ("structure", structure.as_str()),
                ("broken_code", broken_code),
                ("error_message", error_message),
            ],
        );
        let code = self.ask(prompt, "repair").await?;
        if code.trim() == broken_code.trim() {
            info!(identity = %self.config.id, "Repair returned the broken code unchanged");
            return Err(SynthesisError::UnchangedRepair {
                identity: self.config.id,
            });
        }
        Ok(self.artifact(spec, code, version, ArtifactOrigin::Repair))
    }

    async fn ask(&self, prompt: String, operation: &str) -> Result<String, SynthesisError> {
        let identity = self.config.id;
        let request = ModelRequest::new(
            self.config.provider.clone(),
            self.config.model.clone(),
            vec![ChatMessage::system(CODER_SYSTEM_MD), ChatMessage::user(prompt)],
        )
        .with_sampling(self.config.temperature, self.config.seed);

        info!(
            identity = %identity,
            operation,
            model = self.config.model.as_str(),
            "Requesting diagram code"
        );
        let response = call_with_timeout(
            &self.config.provider,
            self.config.timeout,
            self.provider.chat(request),
        )
        .await
        .map_err(|source| SynthesisError::Model { identity, source })?;

        debug!(identity = %identity, chars = response.content().len(), "Coder replied");
        extract_diagram_code(response.content()).ok_or(SynthesisError::NoCodeBlock { identity })
    }

    fn artifact(
        &self,
        spec: &DesignSpec,
        code: String,
        version: u32,
        origin: ArtifactOrigin,
    ) -> DiagramArtifact {
        DiagramArtifact {
            code,
            kind: spec.kind,
            version,
            producer: self.config.id,
            origin,
        }
    }
}
