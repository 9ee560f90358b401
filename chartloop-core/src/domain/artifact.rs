use super::design::DiagramKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of one of the two interchangeable synthesizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SynthesizerId {
    A,
    B,
}

impl SynthesizerId {
    /// The other identity; the repair protocol alternates with this.
    pub fn other(self) -> Self {
        match self {
            SynthesizerId::A => SynthesizerId::B,
            SynthesizerId::B => SynthesizerId::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SynthesizerId::A => "A",
            SynthesizerId::B => "B",
        }
    }
}

impl fmt::Display for SynthesizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coder-{}", self.as_str())
    }
}

/// Which synthesizer operation produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    Generate,
    Revise,
    Repair,
}

/// One immutable version of diagram code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramArtifact {
    pub code: String,
    pub kind: DiagramKind,
    pub version: u32,
    pub producer: SynthesizerId,
    pub origin: ArtifactOrigin,
}

impl DiagramArtifact {
    /// File name used when the code is persisted into a session directory.
    pub fn file_name(&self) -> String {
        format!("v{:03}_{}_{}.mmd", self.version, self.producer.as_str(), origin_tag(self.origin))
    }
}

fn origin_tag(origin: ArtifactOrigin) -> &'static str {
    match origin {
        ArtifactOrigin::Generate => "generate",
        ArtifactOrigin::Revise => "revise",
        ArtifactOrigin::Repair => "repair",
    }
}

/// Handle to an image the renderer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Result of exactly one render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<RenderedImage>,
    /// Short, human-meaningful failure line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unmodified stderr/stdout of a failed render, kept for auditing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_error: Option<String>,
    pub elapsed_ms: u64,
}

impl RenderOutcome {
    pub fn succeeded(image: RenderedImage, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            image: Some(image),
            error: None,
            raw_error: None,
            elapsed_ms,
        }
    }

    pub fn failed(error: impl Into<String>, raw: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            image: None,
            error: Some(error.into()),
            raw_error: Some(raw.into()),
            elapsed_ms,
        }
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error")
    }
}
