//! Where the design of a session comes from.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::DesignSpec;
use crate::domain::design::DesignError;

/// Produces the design a session draws. A failure ends the session before
/// any synthesis happens.
#[async_trait]
pub trait StructureProvider: Send + Sync {
    async fn design(&self, task: &str) -> Result<DesignSpec, DesignError>;
}

/// Reads a design JSON file.
pub struct JsonFileStructureProvider {
    path: PathBuf,
}

impl JsonFileStructureProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StructureProvider for JsonFileStructureProvider {
    async fn design(&self, _task: &str) -> Result<DesignSpec, DesignError> {
        debug!(path = %self.path.display(), "Loading design file");
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DesignError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        DesignSpec::from_json(&text)
    }
}

/// A design already in memory.
pub struct FixedStructure(pub DesignSpec);

#[async_trait]
impl StructureProvider for FixedStructure {
    async fn design(&self, _task: &str) -> Result<DesignSpec, DesignError> {
        self.0.validate()?;
        Ok(self.0.clone())
    }
}
