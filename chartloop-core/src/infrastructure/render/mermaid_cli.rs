//! Mermaid CLI (`mmdc`) backend.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::extract_error_line;
use super::{RenderBackend, RenderRequest};
use crate::config::RendererConfig;
use crate::domain::{RenderOutcome, RenderedImage};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const INSTALL_HINT: &str = "npm install -g @mermaid-js/mermaid-cli";

/// What `chartloop check` reports about the renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RendererStatus {
    pub command: String,
    pub resolved: Option<PathBuf>,
    pub version: Option<String>,
}

impl RendererStatus {
    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

pub struct MermaidCli {
    config: RendererConfig,
    binary: OnceLock<PathBuf>,
}

impl MermaidCli {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            binary: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Locate the renderer on `PATH`, also trying the Windows `.cmd` shim.
    ///
    /// Only a successful lookup is remembered; a miss is retried next call.
    pub fn resolve_binary(&self) -> Option<&Path> {
        if let Some(found) = self.binary.get() {
            return Some(found);
        }
        let found = locate(&self.config.command)?;
        Some(self.binary.get_or_init(|| found))
    }

    /// Resolve the binary and ask it for its version.
    pub async fn check_installation(&self) -> RendererStatus {
        let resolved = self.resolve_binary().map(Path::to_path_buf);
        let version = match &resolved {
            Some(binary) => probe_version(binary).await,
            None => None,
        };
        RendererStatus {
            command: self.config.command.clone(),
            resolved,
            version,
        }
    }

    /// Text written to the renderer input: init directive, then the code.
    fn source_text(&self, code: &str) -> String {
        let directive = self.config.init_directive.trim();
        if directive.is_empty() {
            code.to_string()
        } else {
            format!("{directive}\n{code}")
        }
    }
}

fn locate(command: &str) -> Option<PathBuf> {
    which::which(command)
        .or_else(|_| which::which(format!("{command}.cmd")))
        .ok()
}

async fn probe_version(binary: &Path) -> Option<String> {
    let mut command = Command::new(binary);
    command
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let output = tokio::time::timeout(VERSION_PROBE_TIMEOUT, command.output())
        .await
        .ok()?
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (output.status.success() && !text.is_empty()).then_some(text)
}

#[async_trait]
impl RenderBackend for MermaidCli {
    async fn render(&self, request: RenderRequest) -> RenderOutcome {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let Some(binary) = self.resolve_binary() else {
            let message = format!("{} not found. Install with: {INSTALL_HINT}", self.config.command);
            warn!(command = self.config.command.as_str(), "Renderer binary not found");
            return RenderOutcome::failed(message.clone(), message, elapsed());
        };

        if let Err(err) = tokio::fs::create_dir_all(&request.output_dir).await {
            let message = format!("Cannot create {}: {err}", request.output_dir.display());
            return RenderOutcome::failed(message.clone(), message, elapsed());
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let unique = &suffix[..8];
        let input = request
            .output_dir
            .join(format!("_{}_{unique}.mmd", request.stem));
        let output = request
            .output_dir
            .join(format!("{}_{unique}.{}", request.stem, self.config.format));

        if let Err(err) = tokio::fs::write(&input, self.source_text(&request.code)).await {
            let message = format!("Cannot write render input: {err}");
            return RenderOutcome::failed(message.clone(), message, elapsed());
        }

        let mut command = Command::new(binary);
        command
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .arg("-b")
            .arg(&self.config.background)
            .arg("-s")
            .arg(self.config.scale.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(input = %input.display(), output = %output.display(), "Invoking renderer");
        let result = tokio::time::timeout(self.config.timeout(), command.output()).await;
        let _ = tokio::fs::remove_file(&input).await;

        let finished = match result {
            Err(_) => {
                let message = format!("Render timeout ({}s)", self.config.timeout_secs);
                warn!(stem = request.stem.as_str(), "Renderer timed out");
                return RenderOutcome::failed(message.clone(), message, elapsed());
            }
            Ok(Err(err)) => {
                let message = format!("Failed to start renderer: {err}");
                warn!(%err, "Renderer could not be spawned");
                return RenderOutcome::failed(message.clone(), message, elapsed());
            }
            Ok(Ok(finished)) => finished,
        };

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            let stdout = String::from_utf8_lossy(&finished.stdout);
            let raw = if !stderr.trim().is_empty() {
                stderr.into_owned()
            } else if !stdout.trim().is_empty() {
                stdout.into_owned()
            } else {
                "Unknown error".to_string()
            };
            let short = extract_error_line(&raw);
            info!(
                stem = request.stem.as_str(),
                status = ?finished.status.code(),
                error = short.as_str(),
                "Render failed"
            );
            return RenderOutcome::failed(short, raw, elapsed());
        }

        match tokio::fs::metadata(&output).await {
            Ok(meta) if meta.is_file() => {
                info!(
                    stem = request.stem.as_str(),
                    bytes = meta.len(),
                    "Rendered diagram"
                );
                RenderOutcome::succeeded(
                    RenderedImage {
                        path: output,
                        bytes: meta.len(),
                    },
                    elapsed(),
                )
            }
            _ => RenderOutcome::failed(
                "Output file not created",
                String::from_utf8_lossy(&finished.stdout).into_owned(),
                elapsed(),
            ),
        }
    }

    fn image_extension(&self) -> &str {
        &self.config.format
    }
}
