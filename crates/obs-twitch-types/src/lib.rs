//! Shared types for the Twitch streaming bridge.
//!
//! This crate defines the pipeline configuration, the session state machine
//! and the values a host environment passes across the module boundary.

mod config;
mod host;
mod key;
mod state;

pub use config::{
    AudioSettings, ColorRange, ColorSpace, ConfigError, OutputSettings, PipelineConfig,
    ScaleType, ServiceSettings, SpeakerLayout, VideoFormat, VideoSettings,
};
pub use host::{HostValue, HostValueKind};
pub use key::{StreamKey, StreamKeyError};
pub use state::{SessionState, ShutdownPhase, StartupPhase};

/// Output channel the screen capture is bound to.
pub const VIDEO_CHANNEL: u32 = 0;

/// Output channel the audio capture is bound to.
pub const AUDIO_CHANNEL: u32 = 1;
