use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "chartloop",
    version,
    about = "Generate Mermaid diagrams through a render, critique and revise loop"
)]
pub struct Cli {
    /// Configuration file (defaults to config/chartloop.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Silence all logging
    #[arg(long, short, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Turn a design JSON file into a rendered diagram
    Run(RunArgs),
    /// Report whether the renderer binary can be found
    Check,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Design JSON file
    pub design: PathBuf,
    /// Free-text description kept in the session log
    #[arg(long, short)]
    pub task: Option<String>,
    /// Base name of the published files
    #[arg(long, short)]
    pub output: Option<String>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Override the endpoint of every Ollama provider
    #[arg(long)]
    pub ollama_url: Option<String>,
    /// Accept the first successful render without critique
    #[arg(long)]
    pub skip_inspection: bool,
    /// Disable ping-pong repair between the two coders
    #[arg(long)]
    pub single_coder: bool,
    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}
