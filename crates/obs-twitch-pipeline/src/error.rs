//! Error types for the pipeline module.

use std::fmt;

use thiserror::Error;

/// Kind of library object a creation call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Source,
    VideoEncoder,
    AudioEncoder,
    Service,
    Output,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Source => "source",
            Self::VideoEncoder => "video encoder",
            Self::AudioEncoder => "audio encoder",
            Self::Service => "service",
            Self::Output => "output",
        };
        f.write_str(name)
    }
}

/// Errors reported by the media library.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Global library startup failed.
    #[error("library startup failed for locale {locale:?}")]
    StartupFailed { locale: String },

    /// An operation needed the library's global state, which is not up.
    #[error("library is not initialized")]
    NotInitialized,

    /// Video reset was rejected.
    #[error("video reset rejected ({code}): {reason}")]
    VideoResetFailed { code: i32, reason: &'static str },

    /// Audio reset was rejected.
    #[error("audio reset rejected")]
    AudioResetFailed,

    /// Object creation returned nothing.
    #[error("failed to create {kind} {id:?}")]
    CreateFailed { kind: ObjectKind, id: String },

    /// The output refused to start.
    #[error("output failed to start: {}", .message.as_deref().unwrap_or("no error reported"))]
    OutputStartFailed { message: Option<String> },

    /// A string could not be passed to the library. Only the field is
    /// named; the value may be secret.
    #[error("{field} contains an interior NUL byte")]
    InvalidString { field: &'static str },
}
