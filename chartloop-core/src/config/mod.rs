//! Configuration: providers, agent bindings, loop budgets, renderer and paths.

pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod provider;

pub use crate::constants::CONFIG_PATH;
pub use app::AppConfig;
pub use error::ConfigError;
pub use pipeline::{AgentConfig, AgentsConfig, LoopConfig, PathsConfig, RendererConfig};
pub use provider::{ModelInfo, ModelProviderConfig};
