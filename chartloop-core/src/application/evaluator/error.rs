use std::path::PathBuf;
use thiserror::Error;

/// The critic could not judge the image. Ends the loop with the last render.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to read rendered image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("all {count} inspection calls failed; last error: {last}")]
    AllInspectionsFailed { count: usize, last: String },
    #[error("no questions to inspect")]
    NoQuestions,
}
