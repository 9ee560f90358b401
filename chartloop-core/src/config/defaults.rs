pub const DEFAULT_PROVIDER_ID: &str = "ollama";
pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434";
pub const DEFAULT_CODER_MODEL: &str = "qwen2.5-coder:7b";
pub const DEFAULT_EVALUATOR_MODEL: &str = "llava:13b";
pub const DEFAULT_CODER_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_EVALUATOR_TEMPERATURE: f32 = 0.0;
/// Seed given to coder B when neither coder sets one.
pub const DEFAULT_CODER_B_SEED: u64 = 7;

pub const DEFAULT_MAX_VISUAL_ITERATIONS: u32 = 3;
pub const DEFAULT_MAX_RENDER_RETRIES: u32 = 4;
pub const DEFAULT_MAX_PING_PONG_ROUNDS: u32 = 3;
pub const DEFAULT_APPROVAL_THRESHOLD: f64 = 0.8;
pub const DEFAULT_PLATEAU_THRESHOLD: f64 = 0.6;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_RENDERER_COMMAND: &str = "mmdc";
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RENDER_BACKGROUND: &str = "transparent";
pub const DEFAULT_RENDER_SCALE: u32 = 4;
pub const DEFAULT_RENDER_FORMAT: &str = "png";
pub const DEFAULT_INIT_DIRECTIVE: &str = r#"%%{init: {"flowchart": {"defaultRenderer": "elk"}} }%%"#;

pub const DEFAULT_LOG_DIR: &str = "logs/charts";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs/diagrams";
