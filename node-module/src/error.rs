//! Errors reported back to the host.

use thiserror::Error;

use obs_twitch_engine::EngineError;

/// Prefix on every message handed to the host.
pub const MESSAGE_PREFIX: &str = "obs_twitch_stream_node";

/// The call arguments did not match `(streamKey: string)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Wrong number of arguments.
    #[error("Only 1 argument (stream key as string) should be specified")]
    Count(usize),

    /// The argument was not text.
    #[error("argument (stream key) is not string")]
    NotString,

    /// The argument was empty text.
    #[error("argument (stream key) is empty")]
    Empty,

    /// The argument contained a NUL character.
    #[error("argument (stream key) contains a NUL character")]
    Nul,
}

/// Any failure of a host-facing call.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl BridgeError {
    /// Status code reported across the C ABI.
    pub fn status(&self) -> Status {
        match self {
            Self::Argument(_) => Status::TypeError,
            Self::Engine(_) => Status::PipelineError,
        }
    }

    /// Message as shown to the host.
    pub fn host_message(&self) -> String {
        format!("{MESSAGE_PREFIX}: {self}")
    }
}

/// Status codes returned by the exported functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    /// Bad arguments; the host should raise a type error.
    TypeError = 1,
    /// The media library failed; the stream was not started.
    PipelineError = 2,
    /// A panic was caught at the module boundary.
    Panic = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_errors_map_to_type_error() {
        let err = BridgeError::from(ArgumentError::Empty);
        assert_eq!(err.status(), Status::TypeError);
        assert_eq!(
            err.host_message(),
            "obs_twitch_stream_node: argument (stream key) is empty"
        );
    }

    #[test]
    fn test_count_message_ignores_count() {
        assert_eq!(
            ArgumentError::Count(3).to_string(),
            "Only 1 argument (stream key as string) should be specified"
        );
    }
}
