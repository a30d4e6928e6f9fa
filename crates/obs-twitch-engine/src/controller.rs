//! Single-session controller.

use tracing::{debug, error, info, instrument};

use obs_twitch_pipeline::MediaPipeline;
use obs_twitch_types::{PipelineConfig, SessionState, StreamKey};

use crate::error::EngineError;
use crate::session::Session;

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was created and its output started.
    Started,

    /// A session was already active; nothing changed.
    AlreadyStreaming,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The active session was torn down.
    Stopped,

    /// No session was active; nothing changed.
    NotStreaming,
}

/// Owns the media pipeline and at most one streaming session.
///
/// Two states: Idle and Streaming. Starting while streaming and stopping
/// while idle are logged no-ops. Dropping the controller stops any active
/// session.
pub struct SessionController<P: MediaPipeline> {
    pipeline: P,
    config: PipelineConfig,
    session: Option<Session<P>>,
}

impl<P: MediaPipeline> SessionController<P> {
    /// Create an idle controller.
    pub fn new(pipeline: P, config: PipelineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            pipeline,
            config,
            session: None,
        })
    }

    /// Start streaming with the given key.
    ///
    /// If a session is already active the key is ignored. On failure the
    /// controller stays idle and the library is left shut down.
    #[instrument(name = "start_stream", skip(self, key))]
    pub fn start(&mut self, key: &StreamKey) -> Result<StartOutcome, EngineError> {
        if self.session.is_some() {
            info!(
                output_active = self.output_active(),
                "Streaming already started, ignoring start request"
            );
            return Ok(StartOutcome::AlreadyStreaming);
        }

        info!(%key, "Starting stream");

        match Session::open(&mut self.pipeline, &self.config, key) {
            Ok(session) => {
                self.session = Some(session);
                self.log_transition(SessionState::Idle, SessionState::Streaming);
                info!("Stream started successfully");
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                error!("Stream start failed: {}", e);
                Err(e)
            }
        }
    }

    /// Stop the active stream, if any.
    #[instrument(name = "stop_stream", skip(self))]
    pub fn stop(&mut self) -> StopOutcome {
        let Some(session) = self.session.take() else {
            info!("Streaming not started, ignoring stop request");
            return StopOutcome::NotStreaming;
        };

        info!("Stopping stream");
        session.close(&mut self.pipeline);
        self.log_transition(SessionState::Streaming, SessionState::Idle);
        info!("Stream stopped");

        StopOutcome::Stopped
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        if self.session.is_some() {
            SessionState::Streaming
        } else {
            SessionState::Idle
        }
    }

    /// Returns true if a session is active.
    pub fn is_streaming(&self) -> bool {
        self.state().is_streaming()
    }

    /// Output handle of the active session.
    pub fn output(&self) -> Option<&P::Output> {
        self.session.as_ref().and_then(Session::output)
    }

    /// Whether the library reports the active session's output as running.
    pub fn output_active(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.output_active(&self.pipeline))
    }

    fn log_transition(&self, previous: SessionState, current: SessionState) {
        debug!(
            previous = %previous.name(),
            current = %current.name(),
            "State transition"
        );
    }
}

impl<P: MediaPipeline> Drop for SessionController<P> {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obs_twitch_pipeline::{
        FailPoint, PipelineCall, PipelineError, RecordingHandle, RecordingPipeline,
    };
    use obs_twitch_types::{ConfigError, StartupPhase};

    fn controller() -> (SessionController<RecordingPipeline>, RecordingHandle) {
        let (pipeline, handle) = RecordingPipeline::new();
        let controller = SessionController::new(pipeline, PipelineConfig::default()).unwrap();
        (controller, handle)
    }

    fn key(value: &str) -> StreamKey {
        StreamKey::new(value).unwrap()
    }

    #[test]
    fn test_start_second_start_stop_scenario() {
        let (mut controller, handle) = controller();
        assert_eq!(controller.state(), SessionState::Idle);

        assert_eq!(controller.start(&key("abc123")).unwrap(), StartOutcome::Started);
        assert_eq!(controller.state(), SessionState::Streaming);
        assert!(controller.output().is_some());
        assert!(controller.output_active());
        let calls_after_start = handle.call_count();

        assert_eq!(
            controller.start(&key("xyz999")).unwrap(),
            StartOutcome::AlreadyStreaming
        );
        assert!(controller.is_streaming());
        assert_eq!(handle.call_count(), calls_after_start);
        assert_eq!(
            handle.last_service_settings().unwrap().get("key"),
            Some("abc123")
        );

        assert_eq!(controller.stop(), StopOutcome::Stopped);
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.output().is_none());
        assert_eq!(handle.live_handles(), 0);
        assert!(!handle.is_initialized());
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (mut controller, handle) = controller();

        assert_eq!(controller.stop(), StopOutcome::NotStreaming);
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(handle.call_count(), 0);
    }

    #[test]
    fn test_restart_reinitializes_library() {
        let (mut controller, handle) = controller();

        controller.start(&key("first")).unwrap();
        controller.stop();
        controller.start(&key("second")).unwrap();

        assert_eq!(handle.startups(), 2);
        assert_eq!(handle.active_outputs(), 1);
        assert_eq!(
            handle.last_service_settings().unwrap().get("key"),
            Some("second")
        );
    }

    #[test]
    fn test_every_failure_point_leaves_controller_idle() {
        let config = PipelineConfig::default();
        let points = vec![
            FailPoint::Startup,
            FailPoint::ResetVideo,
            FailPoint::Create(config.video.source_id.clone()),
            FailPoint::Create(config.video.encoder_id.clone()),
            FailPoint::ResetAudio,
            FailPoint::Create(config.audio.source_id.clone()),
            FailPoint::Create(config.audio.encoder_id.clone()),
            FailPoint::Create(config.service.id.clone()),
            FailPoint::Create(config.output.id.clone()),
            FailPoint::StartOutput,
        ];

        for point in points {
            let (mut controller, handle) = controller();
            handle.fail_at(point.clone());

            let result = controller.start(&key("abc123"));

            assert!(result.is_err(), "{point:?} should fail");
            assert_eq!(controller.state(), SessionState::Idle, "{point:?}");
            assert_eq!(handle.live_handles(), 0, "{point:?}");
            assert!(!handle.is_initialized(), "{point:?}");
            assert!(
                !handle
                    .calls()
                    .iter()
                    .any(|c| matches!(c, PipelineCall::Shutdown { leaked } if *leaked > 0)),
                "{point:?}"
            );

            handle.clear_failure();
            assert_eq!(controller.start(&key("abc123")).unwrap(), StartOutcome::Started);
        }
    }

    #[test]
    fn test_video_reset_failure_reports_phase() {
        let (mut controller, handle) = controller();
        handle.fail_at(FailPoint::ResetVideo);

        let err = controller.start(&key("abc123")).unwrap_err();

        assert_eq!(err.phase(), Some(StartupPhase::InitVideo));
        assert!(matches!(
            err,
            EngineError::Pipeline { source: PipelineError::VideoResetFailed { code: -5, .. }, .. }
        ));
    }

    #[test]
    fn test_drop_stops_active_session() {
        let (mut controller, handle) = controller();
        controller.start(&key("abc123")).unwrap();

        drop(controller);

        assert_eq!(handle.live_handles(), 0);
        assert!(!handle.is_initialized());
        assert_eq!(handle.calls().last(), Some(&PipelineCall::Shutdown { leaked: 0 }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (pipeline, _handle) = RecordingPipeline::new();
        let mut config = PipelineConfig::default();
        config.audio.samples_per_sec = 0;

        let result = SessionController::new(pipeline, config);

        assert!(matches!(
            result,
            Err(EngineError::InvalidConfig(ConfigError::Zero("audio.samples_per_sec")))
        ));
    }
}
