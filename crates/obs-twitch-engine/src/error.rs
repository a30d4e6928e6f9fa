//! Error types for the engine.

use thiserror::Error;

use obs_twitch_pipeline::PipelineError;
use obs_twitch_types::{ConfigError, StartupPhase};

/// Errors that can occur while starting a session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pipeline configuration was rejected.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The media library failed during a setup phase.
    #[error("{}: {source}", .phase.name())]
    Pipeline {
        phase: StartupPhase,
        #[source]
        source: PipelineError,
    },
}

impl EngineError {
    /// The setup phase that failed, if the failure came from the library.
    pub fn phase(&self) -> Option<StartupPhase> {
        match self {
            Self::InvalidConfig(_) => None,
            Self::Pipeline { phase, .. } => Some(*phase),
        }
    }
}
