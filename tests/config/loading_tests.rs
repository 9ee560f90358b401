// Loading chartloop.toml from disk.

use chartloop_core::{AppConfig, ConfigError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("chartloop.toml");
    fs::write(&path, content).expect("write config");
    path
}

const FULL_CONFIG: &str = r#"
[[providers]]
id = "local"
type = "ollama"
endpoint = "http://localhost:11434"
models = ["qwen2.5-coder:7b", "llava:13b"]

[[providers]]
id = "cloud"
type = "gemini"
endpoint = "https://generativelanguage.googleapis.com"
api_key = "GEMINI_API_KEY"

[agents.coder_a]
provider = "local"
model = "qwen2.5-coder:7b"
temperature = 0.3
seed = 11

[agents.coder_b]
provider = "local"
model = "deepseek-coder:6.7b"

[agents.evaluator]
provider = "cloud"
model = "gemini-2.0-flash"

[loop]
max_visual_iterations = 4
max_render_retries = 3
max_ping_pong_rounds = 2
approval_threshold = 0.85
plateau_threshold = 0.7
llm_timeout_secs = 30

[renderer]
command = "mmdc"
format = "png"
scale = 2

[paths]
log_dir = "runs/logs"
output_dir = "runs/out"
"#;

#[test]
fn full_config_loads_every_section() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, FULL_CONFIG);

    let config = AppConfig::load(Some(&path)).expect("config");

    assert_eq!(config.providers.len(), 2);
    assert_eq!(config.loop_config.max_visual_iterations, 4);
    assert_eq!(config.loop_config.max_render_attempts(), 6);
    assert_eq!(config.loop_config.max_ping_pong_rounds, 2);
    assert_eq!(config.loop_config.approval_threshold, 0.85);
    assert_eq!(config.agents.coder_a.seed, Some(11));
    assert_eq!(config.agents.coder_b.model, "deepseek-coder:6.7b");
    assert_eq!(config.agents.evaluator.provider, "cloud");
    assert_eq!(config.renderer.scale, 2);
    assert_eq!(config.paths.output_dir, PathBuf::from("runs/out"));

    // Agent models are added to a provider's explicit model list.
    let local = config.provider("local").expect("local provider");
    assert!(local.models.iter().any(|m| m.name == "deepseek-coder:6.7b"));
}

#[test]
fn coder_b_mirrors_coder_a_with_another_seed() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
[agents.coder_a]
model = "codellama:13b"
seed = 5
"#,
    );

    let config = AppConfig::load(Some(&path)).expect("config");
    assert_eq!(config.agents.coder_b.model, "codellama:13b");
    assert_eq!(config.agents.coder_b.provider, config.agents.coder_a.provider);
    assert_ne!(config.agents.coder_b.seed, config.agents.coder_a.seed);
}

#[test]
fn explicit_missing_file_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }));
}

#[test]
fn agent_bound_to_undeclared_provider_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
[agents.coder_a]
provider = "elsewhere"
model = "x"
"#,
    );

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnknownProvider { ref agent, ref provider } if agent == "coder_a" && provider == "elsewhere"
    ));
}

#[test]
fn threshold_outside_unit_range_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[loop]\napproval_threshold = 1.5\n");

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "loop.approval_threshold"));
}

#[test]
fn zero_budget_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[loop]\nmax_render_retries = 0\n");

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

#[test]
fn provider_without_endpoint_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[[providers]]\nid = \"bare\"\ntype = \"openai\"\n");

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEndpoint { ref provider } if provider == "bare"));
}

#[test]
fn unknown_keys_fail_to_parse() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[loop]\nmax_visual_iterations = 2\nturbo = true\n");

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("chartloop.toml"));
}

#[test]
fn loaded_config_round_trips_through_toml() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, FULL_CONFIG);
    let config = AppConfig::load(Some(&path)).expect("config");

    let text = config.to_toml().expect("toml");
    let reloaded = AppConfig::from_toml_str(&text, Path::new("rendered.toml")).expect("reload");
    assert_eq!(reloaded, config);
}

#[test]
fn vector_formats_are_rejected_while_the_critic_inspects() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "[renderer]\nformat = \"svg\"\n");

    let err = AppConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "renderer.format"));
}

#[test]
fn vector_formats_load_when_inspection_is_skipped() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "[loop]\nskip_inspection = true\n\n[renderer]\nformat = \"SVG\"\n",
    );

    let config = AppConfig::load(Some(&path)).expect("config");
    assert_eq!(config.renderer.format, "svg");
    assert!(!config.renderer.is_raster());
}
