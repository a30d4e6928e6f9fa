//! Host-facing start/stop commands.

use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use obs_twitch_engine::{EngineError, SessionController, StartOutcome, StopOutcome};
use obs_twitch_pipeline::MediaPipeline;
use obs_twitch_types::{HostValue, SessionState, StreamKey, StreamKeyError};

use crate::error::{ArgumentError, BridgeError};

/// Validate `(streamKey: string)` and extract the key.
pub fn parse_stream_key(args: &[HostValue]) -> Result<StreamKey, ArgumentError> {
    let [arg] = args else {
        return Err(ArgumentError::Count(args.len()));
    };

    let text = arg.as_str().ok_or(ArgumentError::NotString)?;
    StreamKey::new(text).map_err(|e| match e {
        StreamKeyError::Empty => ArgumentError::Empty,
        StreamKeyError::InteriorNul => ArgumentError::Nul,
    })
}

/// Process-wide owner of the session controller.
///
/// The controller is created on the first valid start request and lives
/// until [`ControllerSlot::shutdown`]. Between sessions it sits idle with the
/// library shut down.
pub struct ControllerSlot<P: MediaPipeline> {
    controller: Mutex<Option<SessionController<P>>>,
}

impl<P: MediaPipeline> ControllerSlot<P> {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self {
            controller: parking_lot::const_mutex(None),
        }
    }

    /// Create a slot around an existing controller.
    pub fn with_controller(controller: SessionController<P>) -> Self {
        Self {
            controller: Mutex::new(Some(controller)),
        }
    }

    /// Handle `obsStartStreamToTwitch(args...)`.
    ///
    /// Arguments are checked before anything else is touched. `create`
    /// builds the controller the first time a stream is started.
    #[instrument(name = "obs_start_stream_to_twitch", skip_all)]
    pub fn start<F>(&self, args: &[HostValue], create: F) -> Result<StartOutcome, BridgeError>
    where
        F: FnOnce() -> Result<SessionController<P>, EngineError>,
    {
        info!("obsStartStreamToTwitch called");
        let key = parse_stream_key(args)?;

        let mut guard = self.controller.lock();
        let controller = match guard.take() {
            Some(controller) => controller,
            None => {
                debug!("Creating session controller");
                create()?
            }
        };

        Ok(guard.insert(controller).start(&key)?)
    }

    /// Handle `obsStopStreamToTwitch()`.
    #[instrument(name = "obs_stop_stream_to_twitch", skip_all)]
    pub fn stop(&self) -> StopOutcome {
        info!("obsStopStreamToTwitch called");
        match self.controller.lock().as_mut() {
            Some(controller) => controller.stop(),
            None => {
                info!("Streaming not started, ignoring stop request");
                StopOutcome::NotStreaming
            }
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.controller
            .lock()
            .as_ref()
            .map_or(SessionState::Idle, SessionController::state)
    }

    /// Drop the controller, stopping any active session.
    pub fn shutdown(&self) {
        if let Some(controller) = self.controller.lock().take() {
            debug!("Dropping session controller");
            drop(controller);
        }
    }

    /// Teardown for process exit.
    ///
    /// Never blocks and never unwinds: a controller held by another thread
    /// is left alone, and a panic during teardown is swallowed. Returns
    /// whether the slot was emptied.
    pub fn shutdown_at_exit(&self) -> bool {
        panic::catch_unwind(AssertUnwindSafe(|| {
            let Some(mut guard) = self.controller.try_lock() else {
                warn!("Session controller busy at exit, skipping teardown");
                return false;
            };
            if let Some(controller) = guard.take() {
                drop(guard);
                info!("Process exiting, tearing down session");
                drop(controller);
            }
            true
        }))
        .unwrap_or(false)
    }
}

impl<P: MediaPipeline> Default for ControllerSlot<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obs_twitch_pipeline::{RecordingHandle, RecordingPipeline};
    use obs_twitch_types::PipelineConfig;

    fn slot() -> (ControllerSlot<RecordingPipeline>, RecordingHandle) {
        let (pipeline, handle) = RecordingPipeline::new();
        let controller = SessionController::new(pipeline, PipelineConfig::default()).unwrap();
        (ControllerSlot::with_controller(controller), handle)
    }

    fn start(
        slot: &ControllerSlot<RecordingPipeline>,
        args: &[HostValue],
    ) -> Result<StartOutcome, BridgeError> {
        slot.start(args, || unreachable!("controller already created"))
    }

    #[test]
    fn test_parse_stream_key() {
        assert_eq!(parse_stream_key(&[]).unwrap_err(), ArgumentError::Count(0));
        assert_eq!(
            parse_stream_key(&["a".into(), "b".into()]).unwrap_err(),
            ArgumentError::Count(2)
        );
        assert_eq!(
            parse_stream_key(&[HostValue::Number(42.0)]).unwrap_err(),
            ArgumentError::NotString
        );
        assert_eq!(
            parse_stream_key(&[HostValue::Null]).unwrap_err(),
            ArgumentError::NotString
        );
        assert_eq!(parse_stream_key(&["".into()]).unwrap_err(), ArgumentError::Empty);
        assert_eq!(
            parse_stream_key(&["ab\0c".into()]).unwrap_err(),
            ArgumentError::Nul
        );
        assert_eq!(parse_stream_key(&["abc123".into()]).unwrap().expose(), "abc123");
    }

    #[test]
    fn test_bad_arguments_do_not_create_controller() {
        let slot: ControllerSlot<RecordingPipeline> = ControllerSlot::new();

        let err = slot
            .start(&[HostValue::Number(42.0)], || unreachable!("must not be created"))
            .unwrap_err();

        assert!(matches!(err, BridgeError::Argument(ArgumentError::NotString)));
        assert_eq!(slot.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_twice_then_stop() {
        let (slot, handle) = slot();

        assert_eq!(start(&slot, &["abc123".into()]).unwrap(), StartOutcome::Started);
        assert_eq!(slot.state(), SessionState::Streaming);

        assert_eq!(
            start(&slot, &["xyz999".into()]).unwrap(),
            StartOutcome::AlreadyStreaming
        );
        assert_eq!(handle.last_service_settings().unwrap().get("key"), Some("abc123"));

        assert_eq!(slot.stop(), StopOutcome::Stopped);
        assert_eq!(slot.state(), SessionState::Idle);
        assert_eq!(handle.live_handles(), 0);
    }

    #[test]
    fn test_bad_arguments_leave_stream_running() {
        let (slot, handle) = slot();
        start(&slot, &["abc123".into()]).unwrap();
        let calls = handle.call_count();

        for args in [vec![], vec!["".into()], vec![HostValue::Boolean(true)]] {
            let err = start(&slot, &args).unwrap_err();
            assert!(matches!(err, BridgeError::Argument(_)));
        }

        assert_eq!(slot.state(), SessionState::Streaming);
        assert_eq!(handle.call_count(), calls);
    }

    #[test]
    fn test_stop_before_any_start() {
        let slot: ControllerSlot<RecordingPipeline> = ControllerSlot::new();
        assert_eq!(slot.stop(), StopOutcome::NotStreaming);
        assert_eq!(slot.state(), SessionState::Idle);
    }

    #[test]
    fn test_nul_in_key_is_rejected_without_echo() {
        let (slot, handle) = slot();

        let err = start(&slot, &["live_secret\0tail".into()]).unwrap_err();

        assert!(matches!(err, BridgeError::Argument(ArgumentError::Nul)));
        assert!(!err.host_message().contains("secret"));
        assert_eq!(handle.call_count(), 0);
        assert_eq!(slot.state(), SessionState::Idle);
    }

    #[test]
    fn test_shutdown_at_exit_tears_down_stream() {
        let (slot, handle) = slot();
        start(&slot, &["abc123".into()]).unwrap();

        assert!(slot.shutdown_at_exit());

        assert!(!handle.is_initialized());
        assert_eq!(handle.live_handles(), 0);
        assert_eq!(handle.active_outputs(), 0);
    }

    #[test]
    fn test_shutdown_at_exit_skips_busy_slot() {
        let (slot, handle) = slot();
        start(&slot, &["abc123".into()]).unwrap();

        let held = slot.controller.lock();
        assert!(!slot.shutdown_at_exit());
        drop(held);

        assert!(handle.is_initialized());
        assert_eq!(slot.state(), SessionState::Streaming);
    }

    #[test]
    fn test_shutdown_stops_active_stream() {
        let (slot, handle) = slot();
        start(&slot, &["abc123".into()]).unwrap();

        slot.shutdown();

        assert_eq!(slot.state(), SessionState::Idle);
        assert!(!handle.is_initialized());
        assert_eq!(handle.live_handles(), 0);
    }
}
