//! Application constants
//!
//! Single source of truth for paths and other constants.

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/chartloop.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// Default Gemini API path (fallback when not specified in config)
pub const DEFAULT_GEMINI_API_PATH: &str = "v1beta/models";

/// Default OpenAI-compatible chat path
pub const DEFAULT_OPENAI_API_PATH: &str = "/v1/chat/completions";

/// Name of the final code file inside a session directory
pub const FINAL_CODE_FILE: &str = "final.mmd";

/// Base name of published files when the caller gives none
pub const DEFAULT_OUTPUT_NAME: &str = "final";
