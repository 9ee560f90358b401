//! Agent bindings, loop budgets, renderer and output paths.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use super::error::ConfigError;

/// Which provider/model one agent talks to, and how it samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    pub coder_a: AgentConfig,
    pub coder_b: AgentConfig,
    pub evaluator: AgentConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        let coder_a = AgentConfig {
            provider: DEFAULT_PROVIDER_ID.to_string(),
            model: DEFAULT_CODER_MODEL.to_string(),
            temperature: Some(DEFAULT_CODER_TEMPERATURE),
            seed: None,
        };
        Self {
            coder_b: coder_b_from(&coder_a),
            coder_a,
            evaluator: AgentConfig {
                provider: DEFAULT_PROVIDER_ID.to_string(),
                model: DEFAULT_EVALUATOR_MODEL.to_string(),
                temperature: Some(DEFAULT_EVALUATOR_TEMPERATURE),
                seed: None,
            },
        }
    }
}

/// Coder B mirrors coder A with another seed.
fn coder_b_from(coder_a: &AgentConfig) -> AgentConfig {
    let seed = coder_a
        .seed
        .map(|seed| seed.wrapping_add(1))
        .unwrap_or(DEFAULT_CODER_B_SEED);
    AgentConfig {
        seed: Some(seed),
        ..coder_a.clone()
    }
}

/// Budgets and thresholds of the revise loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    pub max_visual_iterations: u32,
    pub max_render_retries: u32,
    pub max_ping_pong_rounds: u32,
    pub approval_threshold: f64,
    pub plateau_threshold: f64,
    pub use_dual_coder: bool,
    pub skip_inspection: bool,
    pub llm_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_timeout_secs: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_visual_iterations: DEFAULT_MAX_VISUAL_ITERATIONS,
            max_render_retries: DEFAULT_MAX_RENDER_RETRIES,
            max_ping_pong_rounds: DEFAULT_MAX_PING_PONG_ROUNDS,
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
            plateau_threshold: DEFAULT_PLATEAU_THRESHOLD,
            use_dual_coder: true,
            skip_inspection: false,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            session_timeout_secs: None,
        }
    }
}

impl LoopConfig {
    /// Cap on render calls for one session (every call counts).
    pub fn max_render_attempts(&self) -> u32 {
        self.max_render_retries.saturating_mul(2)
    }

    /// Cap on repair calls inside one ping-pong run.
    pub fn max_repair_attempts(&self) -> u32 {
        self.max_ping_pong_rounds.saturating_mul(2)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("loop.max_visual_iterations", self.max_visual_iterations),
            ("loop.max_render_retries", self.max_render_retries),
            ("loop.max_ping_pong_rounds", self.max_ping_pong_rounds),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        for (field, value) in [
            ("loop.approval_threshold", self.approval_threshold),
            ("loop.plateau_threshold", self.plateau_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")));
            }
        }
        if self.llm_timeout_secs == 0 {
            return Err(ConfigError::invalid("loop.llm_timeout_secs", "must be at least 1"));
        }
        if self.session_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("loop.session_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }
}

/// External renderer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    pub command: String,
    pub timeout_secs: u64,
    pub background: String,
    pub scale: u32,
    pub format: String,
    /// Header line written before the code; empty disables it
    pub init_directive: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_RENDERER_COMMAND.to_string(),
            timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            background: DEFAULT_RENDER_BACKGROUND.to_string(),
            scale: DEFAULT_RENDER_SCALE,
            format: DEFAULT_RENDER_FORMAT.to_string(),
            init_directive: DEFAULT_INIT_DIRECTIVE.to_string(),
        }
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the output can be handed to the vision critic.
    pub fn is_raster(&self) -> bool {
        self.format == "png"
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::invalid("renderer.command", "must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("renderer.timeout_secs", "must be at least 1"));
        }
        if self.scale == 0 {
            return Err(ConfigError::invalid("renderer.scale", "must be at least 1"));
        }
        if !matches!(self.format.as_str(), "png" | "svg" | "pdf") {
            return Err(ConfigError::invalid(
                "renderer.format",
                format!("'{}' is not one of png, svg, pdf", self.format),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root under which one directory per session is created
    pub log_dir: PathBuf,
    /// Where final code and image are published
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawAgent {
    pub(super) provider: Option<String>,
    pub(super) model: Option<String>,
    pub(super) temperature: Option<f32>,
    pub(super) seed: Option<u64>,
}

impl RawAgent {
    fn overlay(self, base: &AgentConfig) -> AgentConfig {
        AgentConfig {
            provider: self.provider.unwrap_or_else(|| base.provider.clone()),
            model: self.model.unwrap_or_else(|| base.model.clone()),
            temperature: self.temperature.or(base.temperature),
            seed: self.seed.or(base.seed),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawAgents {
    pub(super) coder_a: Option<RawAgent>,
    pub(super) coder_b: Option<RawAgent>,
    pub(super) evaluator: Option<RawAgent>,
}

impl From<RawAgents> for AgentsConfig {
    fn from(raw: RawAgents) -> Self {
        let defaults = AgentsConfig::default();
        let coder_a = raw.coder_a.unwrap_or_default().overlay(&defaults.coder_a);
        let coder_b = match raw.coder_b {
            Some(b) => b.overlay(&coder_a),
            None => coder_b_from(&coder_a),
        };
        let evaluator = raw.evaluator.unwrap_or_default().overlay(&defaults.evaluator);
        Self {
            coder_a,
            coder_b,
            evaluator,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawLoop {
    max_visual_iterations: Option<u32>,
    max_render_retries: Option<u32>,
    max_ping_pong_rounds: Option<u32>,
    approval_threshold: Option<f64>,
    plateau_threshold: Option<f64>,
    use_dual_coder: Option<bool>,
    skip_inspection: Option<bool>,
    llm_timeout_secs: Option<u64>,
    session_timeout_secs: Option<u64>,
}

impl From<RawLoop> for LoopConfig {
    fn from(raw: RawLoop) -> Self {
        let d = LoopConfig::default();
        Self {
            max_visual_iterations: raw.max_visual_iterations.unwrap_or(d.max_visual_iterations),
            max_render_retries: raw.max_render_retries.unwrap_or(d.max_render_retries),
            max_ping_pong_rounds: raw.max_ping_pong_rounds.unwrap_or(d.max_ping_pong_rounds),
            approval_threshold: raw.approval_threshold.unwrap_or(d.approval_threshold),
            plateau_threshold: raw.plateau_threshold.unwrap_or(d.plateau_threshold),
            use_dual_coder: raw.use_dual_coder.unwrap_or(d.use_dual_coder),
            skip_inspection: raw.skip_inspection.unwrap_or(d.skip_inspection),
            llm_timeout_secs: raw.llm_timeout_secs.unwrap_or(d.llm_timeout_secs),
            session_timeout_secs: raw.session_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawRenderer {
    command: Option<String>,
    timeout_secs: Option<u64>,
    background: Option<String>,
    scale: Option<u32>,
    format: Option<String>,
    init_directive: Option<String>,
}

impl From<RawRenderer> for RendererConfig {
    fn from(raw: RawRenderer) -> Self {
        let d = RendererConfig::default();
        Self {
            command: raw.command.map(|c| expand(&c)).unwrap_or(d.command),
            timeout_secs: raw.timeout_secs.unwrap_or(d.timeout_secs),
            background: raw.background.unwrap_or(d.background),
            scale: raw.scale.unwrap_or(d.scale),
            format: raw.format.map(|f| f.to_ascii_lowercase()).unwrap_or(d.format),
            init_directive: raw.init_directive.unwrap_or(d.init_directive),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawPaths {
    log_dir: Option<String>,
    output_dir: Option<String>,
}

impl From<RawPaths> for PathsConfig {
    fn from(raw: RawPaths) -> Self {
        let d = PathsConfig::default();
        Self {
            log_dir: raw.log_dir.map(|p| PathBuf::from(expand(&p))).unwrap_or(d.log_dir),
            output_dir: raw
                .output_dir
                .map(|p| PathBuf::from(expand(&p)))
                .unwrap_or(d.output_dir),
        }
    }
}

fn expand(s: &str) -> String {
    shellexpand::full(s)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
