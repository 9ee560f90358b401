//! # chartloop-core
//!
//! Turns a structured design into a rendered Mermaid diagram through a
//! bounded loop of code synthesis, rendering, repair and visual critique.
//!
//! The entry point is [`ChartLoop`]: build it from an [`AppConfig`], a
//! [`ModelProvider`](infrastructure::model::ModelProvider) and a
//! [`RenderBackend`](infrastructure::render::RenderBackend), then call
//! [`ChartLoop::run`] once per diagram.

pub mod application;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;
pub mod templates;

pub use application::cancel::{CancelHandle, CancelSignal};
pub use application::orchestrator::{
    ChartLoop, ChartOutcome, ChartRequest, LoopError, TerminalReason,
};
pub use application::structure::{FixedStructure, JsonFileStructureProvider, StructureProvider};
pub use application::{evaluator, synthesizer};
pub use config::{AppConfig, ConfigError, ModelProviderConfig};
pub use domain::DesignSpec;
pub use infrastructure::{model, render};
