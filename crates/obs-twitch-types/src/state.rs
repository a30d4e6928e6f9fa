//! Session state machine types.

/// The current state of the session controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session, library not initialized.
    #[default]
    Idle,

    /// A session exists and its output has been started.
    Streaming,
}

impl SessionState {
    /// Returns true if a session is active.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Streaming => "Streaming",
        }
    }
}

/// Session setup phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    /// Global library startup, plugin loading and type listing.
    InitLibrary,

    /// Video reset, screen capture source and video encoder.
    InitVideo,

    /// Audio reset, audio capture source and audio encoder.
    InitAudio,

    /// Streaming service creation.
    CreateService,

    /// RTMP output creation and wiring.
    CreateOutput,

    /// Starting the output.
    StartOutput,
}

impl StartupPhase {
    /// The first phase of a setup.
    pub const FIRST: Self = Self::InitLibrary;

    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::InitLibrary => Some(Self::InitVideo),
            Self::InitVideo => Some(Self::InitAudio),
            Self::InitAudio => Some(Self::CreateService),
            Self::CreateService => Some(Self::CreateOutput),
            Self::CreateOutput => Some(Self::StartOutput),
            Self::StartOutput => None,
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::InitLibrary => "Initializing library",
            Self::InitVideo => "Initializing video",
            Self::InitAudio => "Initializing audio",
            Self::CreateService => "Creating service",
            Self::CreateOutput => "Creating output",
            Self::StartOutput => "Starting output",
        }
    }
}

/// Teardown phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Stopping and releasing the output.
    StopOutput,

    /// Releasing the streaming service.
    ReleaseService,

    /// Releasing the audio and video encoders.
    ReleaseEncoders,

    /// Unbinding and releasing the capture sources.
    ReleaseSources,

    /// Global library shutdown.
    ShutdownLibrary,
}

impl ShutdownPhase {
    /// The first phase of a teardown.
    pub const FIRST: Self = Self::StopOutput;

    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::StopOutput => Some(Self::ReleaseService),
            Self::ReleaseService => Some(Self::ReleaseEncoders),
            Self::ReleaseEncoders => Some(Self::ReleaseSources),
            Self::ReleaseSources => Some(Self::ShutdownLibrary),
            Self::ShutdownLibrary => None,
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::StopOutput => "Stopping output",
            Self::ReleaseService => "Releasing service",
            Self::ReleaseEncoders => "Releasing encoders",
            Self::ReleaseSources => "Releasing sources",
            Self::ShutdownLibrary => "Shutting down library",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_phases_walk_forward() {
        let mut forward = vec![StartupPhase::FIRST];
        while let Some(next) = forward.last().and_then(|p| p.next()) {
            forward.push(next);
        }
        assert_eq!(
            forward,
            vec![
                StartupPhase::InitLibrary,
                StartupPhase::InitVideo,
                StartupPhase::InitAudio,
                StartupPhase::CreateService,
                StartupPhase::CreateOutput,
                StartupPhase::StartOutput,
            ]
        );
    }

    #[test]
    fn test_shutdown_ends_with_library() {
        let mut phase = ShutdownPhase::FIRST;
        let mut count = 1;
        while let Some(next) = phase.next() {
            phase = next;
            count += 1;
        }
        assert_eq!(phase, ShutdownPhase::ShutdownLibrary);
        assert_eq!(count, 5);
    }

    #[test]
    fn test_default_state_is_idle() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Idle);
        assert!(!state.is_streaming());
        assert_eq!(SessionState::Streaming.name(), "Streaming");
    }
}
