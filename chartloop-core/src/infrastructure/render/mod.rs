//! Render backend: diagram code in, image file or failure text out.

mod errors;
mod mermaid_cli;

pub use errors::{MAX_ERROR_CHARS, extract_error_line};
pub use mermaid_cli::{MermaidCli, RendererStatus};

use crate::domain::RenderOutcome;
use async_trait::async_trait;
use std::path::PathBuf;

/// One render call. The backend derives unique file names from `stem`.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub code: String,
    pub output_dir: PathBuf,
    pub stem: String,
}

impl RenderRequest {
    pub fn new(code: impl Into<String>, output_dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            output_dir: output_dir.into(),
            stem: stem.into(),
        }
    }
}

/// Turns diagram code into an image.
///
/// Implementations never retry and never return an error: every failure is
/// reported as a failed [`RenderOutcome`].
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(&self, request: RenderRequest) -> RenderOutcome;

    /// File extension of produced images.
    fn image_extension(&self) -> &str {
        "png"
    }
}

#[async_trait]
impl<R: RenderBackend + ?Sized> RenderBackend for std::sync::Arc<R> {
    async fn render(&self, request: RenderRequest) -> RenderOutcome {
        (**self).render(request).await
    }

    fn image_extension(&self) -> &str {
        (**self).image_extension()
    }
}
