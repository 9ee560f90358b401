mod cli;

use chartloop_core::config::ConfigError;
use chartloop_core::model::DynamicModelProvider;
use chartloop_core::render::{MermaidCli, RenderBackend};
use chartloop_core::{
    AppConfig, CancelSignal, ChartLoop, ChartOutcome, ChartRequest, JsonFileStructureProvider,
    LoopError, ModelProviderConfig,
};
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error("failed to encode outcome: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn user_message(&self) -> String {
        match self {
            CliError::Config(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    init_tracing(cli.quiet);
    debug!(command = ?cli.command, config = ?cli.config, "CLI arguments parsed");

    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => Ok(check(&config).await),
        Command::Run(args) => run_chart(config, args).await,
    }
}

async fn check(config: &AppConfig) -> ExitCode {
    let renderer = MermaidCli::new(config.renderer.clone());
    let status = renderer.check_installation().await;
    match (&status.resolved, &status.version) {
        (Some(path), version) => {
            println!("Renderer: {} ({})", status.command, path.display());
            println!("Version:  {}", version.as_deref().unwrap_or("unknown"));
        }
        (None, _) => println!("Renderer '{}' was not found on PATH", status.command),
    }
    if status.is_available() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_chart(mut config: AppConfig, args: RunArgs) -> Result<ExitCode, CliError> {
    apply_cli_overrides(&args, &mut config);

    let provider = DynamicModelProvider::from_configs(&config.providers);
    let renderer = MermaidCli::new(config.renderer.clone());
    let status = renderer.check_installation().await;
    if !status.is_available() {
        warn!(command = status.command.as_str(), "Renderer not found, every render will fail");
    }

    let chart = ChartLoop::new(provider, renderer, &config);
    let structure = JsonFileStructureProvider::new(&args.design);
    let mut request = ChartRequest::new(
        args.task
            .clone()
            .unwrap_or_else(|| format!("Diagram for {}", args.design.display())),
    );
    if let Some(name) = &args.output {
        request = request.with_output_name(name.clone());
    }

    let (handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling session");
            handle.cancel();
        }
    });

    info!(design = %args.design.display(), "Starting chart session");
    let outcome = chart.run(&structure, &request, cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome, chart.renderer());
    }
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary<R: RenderBackend>(outcome: &ChartOutcome, renderer: &R) {
    println!("Session:   {}", outcome.session_id);
    println!("Result:    {}", outcome.terminal);
    println!(
        "Success:   {}",
        if outcome.success { "image produced" } else { "no image" }
    );
    println!("Approved:  {}", if outcome.approved { "yes" } else { "no" });
    if let Some(score) = outcome.score {
        println!("Score:     {score:.2}");
    }
    println!(
        "Budget:    {} visual iteration(s), {} render attempt(s)",
        outcome.visual_iterations, outcome.render_attempts
    );
    if !outcome.repair_identities.is_empty() {
        let identities: Vec<&str> = outcome
            .repair_identities
            .iter()
            .map(|id| id.as_str())
            .collect();
        println!("Repairs:   {}", identities.join(" -> "));
    }
    if let Some(path) = &outcome.code_path {
        println!("Code:      {}", path.display());
    }
    if let Some(path) = &outcome.image_path {
        println!("Image:     {} ({})", path.display(), renderer.image_extension());
    }
    if let Some(error) = &outcome.last_error {
        println!("Last error: {error}");
    }
    println!("Log:       {}", outcome.manifest_path.display());
}

fn init_tracing(quiet: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = if quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}

fn apply_cli_overrides(args: &RunArgs, config: &mut AppConfig) {
    if let Some(url) = &args.ollama_url {
        for provider in config.providers.iter_mut().filter(|p| p.is_ollama()) {
            override_endpoint(provider, url);
        }
    }
    if let Some(dir) = &args.output_dir {
        config.paths.output_dir = dir.clone();
    }
    if args.skip_inspection {
        config.loop_config.skip_inspection = true;
    }
    if args.single_coder {
        config.loop_config.use_dual_coder = false;
    }
}

fn override_endpoint(provider: &mut ModelProviderConfig, url: &str) {
    if provider.endpoint != url {
        info!(
            provider = provider.id.as_str(),
            url,
            "Overriding provider endpoint based on CLI flag"
        );
    }
    provider.endpoint = url.to_string();
}
