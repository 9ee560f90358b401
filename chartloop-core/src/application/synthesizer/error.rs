use crate::domain::SynthesizerId;
use crate::infrastructure::model::ModelError;
use thiserror::Error;

/// A synthesizer call produced no usable artifact. Recoverable.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("{identity} model call failed: {source}")]
    Model {
        identity: SynthesizerId,
        #[source]
        source: ModelError,
    },
    #[error("{identity} returned no extractable diagram code")]
    NoCodeBlock { identity: SynthesizerId },
    #[error("{identity} returned code identical to the broken input")]
    UnchangedRepair { identity: SynthesizerId },
}

impl SynthesisError {
    pub fn identity(&self) -> SynthesizerId {
        match self {
            SynthesisError::Model { identity, .. }
            | SynthesisError::NoCodeBlock { identity }
            | SynthesisError::UnchangedRepair { identity } => *identity,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            SynthesisError::Model { source, .. } => source.user_message(),
            other => other.to_string(),
        }
    }
}
