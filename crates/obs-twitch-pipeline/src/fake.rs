//! In-memory pipeline that records every call.
//!
//! Used by the engine and module tests in place of libobs. It mirrors the
//! library rules that matter to the controller: objects can only be created
//! while the library is up, startup fails when already started, and handles
//! still alive at shutdown are reported as leaked.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use obs_twitch_types::{AudioSettings, VideoSettings};

use crate::error::{ObjectKind, PipelineError};
use crate::{MediaPipeline, PipelineResult, ServiceData, TypeKind};

/// Opaque handle issued by [`RecordingPipeline`].
#[derive(Debug, PartialEq, Eq)]
pub struct FakeHandle(u64);

impl FakeHandle {
    /// Numeric id, as it appears in [`PipelineCall`]s.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A call made against the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCall {
    Startup { locale: String },
    LoadAllModules,
    ListTypes(TypeKind),
    ResetVideo(VideoSettings),
    ResetAudio(AudioSettings),
    CreateSource { id: String, handle: u64 },
    SetOutputSource { channel: u32, source: Option<u64> },
    ReleaseSource(u64),
    CreateVideoEncoder { id: String, handle: u64 },
    CreateAudioEncoder { id: String, mixer_index: usize, handle: u64 },
    AttachVideo(u64),
    AttachAudio(u64),
    ReleaseEncoder(u64),
    CreateService { id: String, name: String, settings: ServiceData, handle: u64 },
    ReleaseService(u64),
    CreateOutput { id: String, handle: u64 },
    ConnectOutput { output: u64, video: u64, audio: u64, track: usize, service: u64 },
    StartOutput(u64),
    StopOutput(u64),
    ReleaseOutput(u64),
    Shutdown { leaked: usize },
}

/// Where to inject a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailPoint {
    Startup,
    ResetVideo,
    ResetAudio,
    /// Creation of any object with this type id.
    Create(String),
    StartOutput,
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<PipelineCall>,
    live: BTreeSet<u64>,
    active_outputs: BTreeSet<u64>,
    next_handle: u64,
    initialized: bool,
    fail_at: Option<FailPoint>,
}

impl Recorder {
    fn issue(&mut self) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        self.next_handle
    }

    fn release(&mut self, handle: u64) {
        self.live.remove(&handle);
        self.active_outputs.remove(&handle);
    }

    fn should_fail(&self, point: &FailPoint) -> bool {
        self.fail_at.as_ref() == Some(point)
    }

    fn create(&mut self, kind: ObjectKind, id: &str) -> PipelineResult<u64> {
        if !self.initialized {
            return Err(PipelineError::NotInitialized);
        }
        if self.should_fail(&FailPoint::Create(id.to_string())) {
            return Err(PipelineError::CreateFailed {
                kind,
                id: id.to_string(),
            });
        }
        Ok(self.issue())
    }
}

/// Inspection side of a [`RecordingPipeline`], usable after the pipeline has
/// been moved into a controller.
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingHandle {
    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<PipelineCall> {
        self.inner.lock().calls.clone()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Handles created and not yet released.
    pub fn live_handles(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Whether the library's global state is up.
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().initialized
    }

    /// Number of outputs currently started.
    pub fn active_outputs(&self) -> usize {
        self.inner.lock().active_outputs.len()
    }

    /// Number of successful startups.
    pub fn startups(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, PipelineCall::Startup { .. }))
            .count()
    }

    /// Make the next matching call fail. Persists until cleared.
    pub fn fail_at(&self, point: FailPoint) {
        self.inner.lock().fail_at = Some(point);
    }

    /// Stop injecting failures.
    pub fn clear_failure(&self) {
        self.inner.lock().fail_at = None;
    }

    /// Settings of the most recently created service.
    pub fn last_service_settings(&self) -> Option<ServiceData> {
        self.inner.lock().calls.iter().rev().find_map(|c| match c {
            PipelineCall::CreateService { settings, .. } => Some(settings.clone()),
            _ => None,
        })
    }
}

/// Pipeline double that records calls instead of touching a media library.
#[derive(Debug, Default)]
pub struct RecordingPipeline {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingPipeline {
    /// Create a pipeline and the handle used to inspect it.
    pub fn new() -> (Self, RecordingHandle) {
        let pipeline = Self::default();
        let handle = RecordingHandle {
            inner: Arc::clone(&pipeline.inner),
        };
        (pipeline, handle)
    }

    fn record(&self, call: PipelineCall) {
        self.inner.lock().calls.push(call);
    }
}

impl MediaPipeline for RecordingPipeline {
    type Source = FakeHandle;
    type Encoder = FakeHandle;
    type Service = FakeHandle;
    type Output = FakeHandle;

    fn startup(&mut self, locale: &str) -> PipelineResult<()> {
        let mut rec = self.inner.lock();
        if rec.initialized || rec.should_fail(&FailPoint::Startup) {
            return Err(PipelineError::StartupFailed {
                locale: locale.to_string(),
            });
        }
        rec.initialized = true;
        rec.calls.push(PipelineCall::Startup {
            locale: locale.to_string(),
        });
        Ok(())
    }

    fn load_all_modules(&mut self) {
        self.record(PipelineCall::LoadAllModules);
    }

    fn available_types(&self, kind: TypeKind) -> Vec<String> {
        self.record(PipelineCall::ListTypes(kind));
        let ids: &[&str] = match kind {
            TypeKind::Input => &["monitor_capture", "wasapi_input_capture"],
            TypeKind::Output => &["rtmp_output", "ffmpeg_muxer"],
            TypeKind::Source => &["monitor_capture", "wasapi_input_capture", "scene"],
            TypeKind::Encoder => &["obs_x264", "ffmpeg_aac"],
            TypeKind::Service => &["rtmp_common", "rtmp_custom"],
        };
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn reset_video(&mut self, settings: &VideoSettings) -> PipelineResult<()> {
        let mut rec = self.inner.lock();
        if !rec.initialized {
            return Err(PipelineError::NotInitialized);
        }
        if rec.should_fail(&FailPoint::ResetVideo) {
            return Err(PipelineError::VideoResetFailed {
                code: -5,
                reason: "graphics module not found",
            });
        }
        rec.calls.push(PipelineCall::ResetVideo(settings.clone()));
        Ok(())
    }

    fn reset_audio(&mut self, settings: &AudioSettings) -> PipelineResult<()> {
        let mut rec = self.inner.lock();
        if !rec.initialized {
            return Err(PipelineError::NotInitialized);
        }
        if rec.should_fail(&FailPoint::ResetAudio) {
            return Err(PipelineError::AudioResetFailed);
        }
        rec.calls.push(PipelineCall::ResetAudio(settings.clone()));
        Ok(())
    }

    fn create_source(&mut self, id: &str, _name: &str) -> PipelineResult<FakeHandle> {
        let mut rec = self.inner.lock();
        let handle = rec.create(ObjectKind::Source, id)?;
        rec.calls.push(PipelineCall::CreateSource {
            id: id.to_string(),
            handle,
        });
        Ok(FakeHandle(handle))
    }

    fn set_output_source(&mut self, channel: u32, source: Option<&FakeHandle>) {
        self.record(PipelineCall::SetOutputSource {
            channel,
            source: source.map(FakeHandle::id),
        });
    }

    fn release_source(&mut self, source: FakeHandle) {
        let mut rec = self.inner.lock();
        rec.release(source.0);
        rec.calls.push(PipelineCall::ReleaseSource(source.0));
    }

    fn create_video_encoder(&mut self, id: &str, _name: &str) -> PipelineResult<FakeHandle> {
        let mut rec = self.inner.lock();
        let handle = rec.create(ObjectKind::VideoEncoder, id)?;
        rec.calls.push(PipelineCall::CreateVideoEncoder {
            id: id.to_string(),
            handle,
        });
        Ok(FakeHandle(handle))
    }

    fn create_audio_encoder(
        &mut self,
        id: &str,
        _name: &str,
        mixer_index: usize,
    ) -> PipelineResult<FakeHandle> {
        let mut rec = self.inner.lock();
        let handle = rec.create(ObjectKind::AudioEncoder, id)?;
        rec.calls.push(PipelineCall::CreateAudioEncoder {
            id: id.to_string(),
            mixer_index,
            handle,
        });
        Ok(FakeHandle(handle))
    }

    fn attach_video(&mut self, encoder: &FakeHandle) {
        self.record(PipelineCall::AttachVideo(encoder.0));
    }

    fn attach_audio(&mut self, encoder: &FakeHandle) {
        self.record(PipelineCall::AttachAudio(encoder.0));
    }

    fn release_encoder(&mut self, encoder: FakeHandle) {
        let mut rec = self.inner.lock();
        rec.release(encoder.0);
        rec.calls.push(PipelineCall::ReleaseEncoder(encoder.0));
    }

    fn create_service(
        &mut self,
        id: &str,
        name: &str,
        settings: &ServiceData,
    ) -> PipelineResult<FakeHandle> {
        let mut rec = self.inner.lock();
        let handle = rec.create(ObjectKind::Service, id)?;
        rec.calls.push(PipelineCall::CreateService {
            id: id.to_string(),
            name: name.to_string(),
            settings: settings.clone(),
            handle,
        });
        Ok(FakeHandle(handle))
    }

    fn release_service(&mut self, service: FakeHandle) {
        let mut rec = self.inner.lock();
        rec.release(service.0);
        rec.calls.push(PipelineCall::ReleaseService(service.0));
    }

    fn create_output(&mut self, id: &str, _name: &str) -> PipelineResult<FakeHandle> {
        let mut rec = self.inner.lock();
        let handle = rec.create(ObjectKind::Output, id)?;
        rec.calls.push(PipelineCall::CreateOutput {
            id: id.to_string(),
            handle,
        });
        Ok(FakeHandle(handle))
    }

    fn connect_output(
        &mut self,
        output: &FakeHandle,
        video: &FakeHandle,
        audio: &FakeHandle,
        track: usize,
        service: &FakeHandle,
    ) {
        self.record(PipelineCall::ConnectOutput {
            output: output.0,
            video: video.0,
            audio: audio.0,
            track,
            service: service.0,
        });
    }

    fn start_output(&mut self, output: &FakeHandle) -> PipelineResult<()> {
        let mut rec = self.inner.lock();
        if rec.should_fail(&FailPoint::StartOutput) {
            return Err(PipelineError::OutputStartFailed {
                message: Some("could not connect to server".to_string()),
            });
        }
        rec.active_outputs.insert(output.0);
        rec.calls.push(PipelineCall::StartOutput(output.0));
        Ok(())
    }

    fn output_active(&self, output: &FakeHandle) -> bool {
        self.inner.lock().active_outputs.contains(&output.0)
    }

    fn stop_output(&mut self, output: &FakeHandle) {
        let mut rec = self.inner.lock();
        rec.active_outputs.remove(&output.0);
        rec.calls.push(PipelineCall::StopOutput(output.0));
    }

    fn release_output(&mut self, output: FakeHandle) {
        let mut rec = self.inner.lock();
        rec.release(output.0);
        rec.calls.push(PipelineCall::ReleaseOutput(output.0));
    }

    fn shutdown(&mut self) {
        let mut rec = self.inner.lock();
        let leaked = rec.live.len();
        if leaked > 0 {
            debug!(leaked, "Shutdown with live handles");
        }
        rec.live.clear();
        rec.active_outputs.clear();
        rec.initialized = false;
        rec.calls.push(PipelineCall::Shutdown { leaked });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_require_startup() {
        let (mut pipeline, handle) = RecordingPipeline::new();

        assert!(matches!(
            pipeline.create_source("monitor_capture", ""),
            Err(PipelineError::NotInitialized)
        ));

        pipeline.startup("en-US").unwrap();
        let source = pipeline.create_source("monitor_capture", "").unwrap();
        assert_eq!(handle.live_handles(), 1);

        pipeline.release_source(source);
        assert_eq!(handle.live_handles(), 0);
    }

    #[test]
    fn test_double_startup_fails() {
        let (mut pipeline, handle) = RecordingPipeline::new();
        pipeline.startup("en-US").unwrap();
        assert!(pipeline.startup("en-US").is_err());

        pipeline.shutdown();
        assert!(!handle.is_initialized());
        pipeline.startup("en-US").unwrap();
        assert_eq!(handle.startups(), 2);
    }

    #[test]
    fn test_shutdown_reports_leaks() {
        let (mut pipeline, handle) = RecordingPipeline::new();
        pipeline.startup("en-US").unwrap();
        let _output = pipeline.create_output("rtmp_output", "").unwrap();

        pipeline.shutdown();
        assert_eq!(
            handle.calls().last(),
            Some(&PipelineCall::Shutdown { leaked: 1 })
        );
    }

    #[test]
    fn test_injected_create_failure() {
        let (mut pipeline, handle) = RecordingPipeline::new();
        pipeline.startup("en-US").unwrap();
        handle.fail_at(FailPoint::Create("obs_x264".to_string()));

        let err = pipeline.create_video_encoder("obs_x264", "").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::CreateFailed { kind: ObjectKind::VideoEncoder, .. }
        ));
        assert!(pipeline.create_source("monitor_capture", "").is_ok());
    }
}
