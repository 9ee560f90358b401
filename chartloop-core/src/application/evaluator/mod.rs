//! Two-stage visual critic: question generation, then parallel inspection.

mod error;
pub mod feedback;
pub mod inspection;
pub mod questions;

pub use error::EvaluationError;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::domain::types::ChatMessage;
use crate::domain::{
    DesignSpec, EvaluationAnswer, EvaluationQuestion, EvaluationRound, QuestionSource,
    RenderedImage,
};
use crate::infrastructure::model::{ModelProvider, ModelRequest, call_with_timeout};
use crate::templates::{CRITIC_SYSTEM_MD, INSPECT_MD, QUESTIONS_MD, fill};

use feedback::{build_feedback, is_approved, score};
use inspection::{answer_from_failure, answer_from_reply};
use questions::{MAX_QUESTIONS, MIN_QUESTIONS, fallback_questions, parse_questions};

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub provider: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub seed: Option<u64>,
    pub timeout: Duration,
    pub approval_threshold: f64,
}

impl EvaluatorConfig {
    pub fn from_agent(agent: &AgentConfig, timeout: Duration, approval_threshold: f64) -> Self {
        Self {
            provider: agent.provider.clone(),
            model: agent.model.clone(),
            temperature: agent.temperature,
            seed: agent.seed,
            timeout,
            approval_threshold,
        }
    }
}

pub struct VisualEvaluator<P> {
    config: EvaluatorConfig,
    provider: P,
}

impl<P: ModelProvider> VisualEvaluator<P> {
    pub fn new(config: EvaluatorConfig, provider: P) -> Self {
        Self { config, provider }
    }

    pub fn threshold(&self) -> f64 {
        self.config.approval_threshold
    }

    /// Score one rendered image against a fresh checklist.
    pub async fn evaluate(
        &self,
        spec: &DesignSpec,
        image: &RenderedImage,
    ) -> Result<EvaluationRound, EvaluationError> {
        let bytes = tokio::fs::read(&image.path)
            .await
            .map_err(|source| EvaluationError::Image {
                path: image.path.clone(),
                source,
            })?;
        let encoded = STANDARD.encode(bytes);

        let (questions, source) = self.generate_questions(spec).await;
        let answers = self.inspect(spec, &questions, &encoded).await?;

        let score = score(&answers);
        let approved = is_approved(score, self.config.approval_threshold);
        let feedback = build_feedback(&questions, &answers, approved);
        info!(score, approved, questions = questions.len(), "Evaluation finished");

        Ok(EvaluationRound {
            questions,
            answers,
            score,
            approved,
            threshold: self.config.approval_threshold,
            source,
            feedback,
        })
    }

    /// Ask the model for a checklist; fall back to built-in checks on failure.
    pub async fn generate_questions(
        &self,
        spec: &DesignSpec,
    ) -> (Vec<EvaluationQuestion>, QuestionSource) {
        let structure = spec.to_prompt_json();
        let adjacency = spec.adjacency().describe();
        let node_count = spec.node_count().to_string();
        let decision_count = spec.decision_count().to_string();
        let min = MIN_QUESTIONS.to_string();
        let max = MAX_QUESTIONS.to_string();
        let prompt = fill(
            QUESTIONS_MD,
            &[
                ("diagram_type", spec.kind.as_str()),
                ("direction_hint", spec.direction.describe()),
                ("node_count", node_count.as_str()),
                ("decision_count", decision_count.as_str()),
                ("adjacency", adjacency.as_str()),
                ("structure", structure.as_str()),
                ("min_questions", min.as_str()),
                ("max_questions", max.as_str()),
            ],
        );
        let request = self.request(vec![ChatMessage::system(CRITIC_SYSTEM_MD), ChatMessage::user(prompt)]);

        match call_with_timeout(&self.config.provider, self.config.timeout, self.provider.chat(request)).await {
            Ok(response) => match parse_questions(response.content()) {
                Some(questions) => {
                    debug!(count = questions.len(), "Using generated questions");
                    (questions, QuestionSource::Generated)
                }
                None => {
                    warn!("Question reply unusable, using fallback checklist");
                    (fallback_questions(spec), QuestionSource::Fallback)
                }
            },
            Err(err) => {
                warn!(%err, "Question generation failed, using fallback checklist");
                (fallback_questions(spec), QuestionSource::Fallback)
            }
        }
    }

    /// Answer every question concurrently; answers come back in question order.
    pub async fn inspect(
        &self,
        spec: &DesignSpec,
        questions: &[EvaluationQuestion],
        image_base64: &str,
    ) -> Result<Vec<EvaluationAnswer>, EvaluationError> {
        if questions.is_empty() {
            return Err(EvaluationError::NoQuestions);
        }

        let calls = questions
            .iter()
            .map(|question| self.ask(spec, question, image_base64));
        let results = join_all(calls).await;

        let mut failures = 0usize;
        let mut last_error = String::new();
        let mut answers: Vec<EvaluationAnswer> = results
            .into_iter()
            .zip(questions)
            .map(|(result, question)| match result {
                Ok(reply) => answer_from_reply(question, &reply),
                Err(err) => {
                    failures += 1;
                    last_error = err;
                    answer_from_failure(question, &last_error)
                }
            })
            .collect();

        if failures == questions.len() {
            return Err(EvaluationError::AllInspectionsFailed {
                count: failures,
                last: last_error,
            });
        }
        if failures > 0 {
            warn!(failures, total = questions.len(), "Some inspections failed");
        }

        answers.sort_by_key(|a| a.question_id);
        Ok(answers)
    }

    async fn ask(
        &self,
        spec: &DesignSpec,
        question: &EvaluationQuestion,
        image_base64: &str,
    ) -> Result<String, String> {
        let focus = if question.focus.trim().is_empty() {
            String::new()
        } else {
            format!("Focus: {}", question.focus)
        };
        let prompt = fill(
            INSPECT_MD,
            &[
                ("diagram_type", spec.kind.as_str()),
                ("question", question.question.as_str()),
                ("focus", focus.as_str()),
            ],
        );
        let request = self.request(vec![
            ChatMessage::system(CRITIC_SYSTEM_MD),
            ChatMessage::user(prompt).with_image(image_base64),
        ]);
        call_with_timeout(&self.config.provider, self.config.timeout, self.provider.chat(request))
            .await
            .map(|response| response.content().to_string())
            .map_err(|err| err.to_string())
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ModelRequest {
        ModelRequest::new(self.config.provider.clone(), self.config.model.clone(), messages)
            .with_sampling(self.config.temperature, self.config.seed)
    }
}
