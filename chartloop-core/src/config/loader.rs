use super::app::AppConfig;
use super::error::ConfigError;
use super::pipeline::{RawAgents, RawLoop, RawPaths, RawRenderer};
use super::provider::{ModelProviderConfig, RawProviderConfig};
use crate::constants::{CONFIG_PATH, ENV_PATH};
use dotenvy::from_filename;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::{debug, warn};

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub providers: Vec<RawProviderConfig>,
    #[serde(default)]
    pub agents: RawAgents,
    #[serde(default, rename = "loop")]
    pub loop_section: RawLoop,
    #[serde(default)]
    pub renderer: RawRenderer,
    #[serde(default)]
    pub paths: RawPaths,
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
    });
}

/// Load and validate configuration.
///
/// An explicit `path` must exist. Without one the default location is tried
/// and a missing file falls back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    match path {
        Some(path) => read_config(path),
        None => {
            let default_path = Path::new(CONFIG_PATH);
            match read_config(default_path) {
                Err(ConfigError::NotFound { path }) => {
                    warn!(path = %path.display(), "No configuration file, using defaults");
                    validate_and_build(RawConfig::default())
                }
                other => other,
            }
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading chartloop configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_config(&content, path)
}

pub(super) fn parse_config(content: &str, origin: &Path) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let mut providers: Vec<ModelProviderConfig> = Vec::new();
    let mut seen = HashSet::new();
    for raw_provider in parsed.providers {
        if raw_provider.endpoint.as_deref().is_none_or(|e| e.trim().is_empty()) {
            return Err(ConfigError::MissingEndpoint {
                provider: raw_provider.id,
            });
        }
        if !seen.insert(raw_provider.id.clone()) {
            return Err(ConfigError::DuplicateProvider {
                provider: raw_provider.id,
            });
        }
        providers.push(ModelProviderConfig::from(raw_provider));
    }
    if providers.is_empty() {
        providers.push(ModelProviderConfig::local_ollama());
    }

    let agents = parsed.agents.into();
    let loop_config = parsed.loop_section.into();
    let renderer = parsed.renderer.into();
    let paths = parsed.paths.into();

    let mut config = AppConfig {
        providers,
        agents,
        loop_config,
        renderer,
        paths,
    };

    config.loop_config.validate()?;
    config.renderer.validate()?;
    if !config.loop_config.skip_inspection && !config.renderer.is_raster() {
        return Err(ConfigError::invalid(
            "renderer.format",
            format!(
                "the critic only inspects png images; '{}' needs loop.skip_inspection = true",
                config.renderer.format
            ),
        ));
    }

    let bindings = [
        ("coder_a", config.agents.coder_a.clone()),
        ("coder_b", config.agents.coder_b.clone()),
        ("evaluator", config.agents.evaluator.clone()),
    ];
    for (agent, binding) in bindings {
        let Some(provider) = config.providers.iter_mut().find(|p| p.id == binding.provider) else {
            return Err(ConfigError::UnknownProvider {
                agent: agent.to_string(),
                provider: binding.provider,
            });
        };
        provider.ensure_model(&binding.model);
    }

    Ok(config)
}
