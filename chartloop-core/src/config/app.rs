use super::error::ConfigError;
use super::pipeline::{AgentsConfig, LoopConfig, PathsConfig, RendererConfig};
use super::provider::ModelProviderConfig;
use serde::Serialize;
use std::path::Path;

/// Effective configuration loaded from chartloop.toml
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub providers: Vec<ModelProviderConfig>,
    pub agents: AgentsConfig,
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
    pub renderer: RendererConfig,
    pub paths: PathsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: vec![ModelProviderConfig::local_ollama()],
            agents: AgentsConfig::default(),
            loop_config: LoopConfig::default(),
            renderer: RendererConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    /// Parse configuration text; `origin` is only used in error messages
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        super::loader::parse_config(content, origin)
    }

    pub fn provider(&self, id: &str) -> Option<&ModelProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
