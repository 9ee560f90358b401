//! Domain model shared by every phase of a chart session.

pub mod artifact;
pub mod design;
pub mod evaluation;
pub mod types;

pub use artifact::{ArtifactOrigin, DiagramArtifact, RenderOutcome, RenderedImage, SynthesizerId};
pub use design::{
    AdjacencySummary, DesignEdge, DesignNode, DesignSpec, DiagramKind, NodeGroup, NodeShape,
};
pub use evaluation::{
    EvaluationAnswer, EvaluationQuestion, EvaluationRound, FeedbackCategory, QuestionSource,
    VisualFeedback,
};
