//! Session resources and their setup/teardown phases.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use obs_twitch_pipeline::{MediaPipeline, PipelineResult, ServiceData};
use obs_twitch_types::{
    PipelineConfig, ShutdownPhase, StartupPhase, StreamKey, AUDIO_CHANNEL, VIDEO_CHANNEL,
};

use crate::diagnostics::log_available_types;
use crate::error::EngineError;

/// One live stream: every library handle created for it.
///
/// Fields are filled phase by phase during [`Session::open`]; teardown
/// releases whatever is present, so the same path serves both a normal stop
/// and the rollback of a half-built session.
pub struct Session<P: MediaPipeline> {
    library_started: bool,
    video_source: Option<P::Source>,
    video_encoder: Option<P::Encoder>,
    audio_source: Option<P::Source>,
    audio_encoder: Option<P::Encoder>,
    service: Option<P::Service>,
    output: Option<P::Output>,
    output_started: bool,
    started_at: Option<Instant>,
}

impl<P: MediaPipeline> Session<P> {
    fn empty() -> Self {
        Self {
            library_started: false,
            video_source: None,
            video_encoder: None,
            audio_source: None,
            audio_encoder: None,
            service: None,
            output: None,
            output_started: false,
            started_at: None,
        }
    }

    /// Build the whole pipeline and start the output.
    ///
    /// On failure everything created so far is released and the library is
    /// shut down again before the error is returned.
    #[instrument(name = "session_open", skip_all)]
    pub fn open(
        pipeline: &mut P,
        config: &PipelineConfig,
        key: &StreamKey,
    ) -> Result<Self, EngineError> {
        let mut session = Self::empty();
        let mut phase = StartupPhase::FIRST;

        loop {
            info!("{}", phase.name());

            if let Err(source) = session.init_phase(pipeline, config, key, phase) {
                warn!(?phase, error = %source, "Setup failed, rolling back");
                session.close(pipeline);
                return Err(EngineError::Pipeline { phase, source });
            }

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        session.started_at = Some(Instant::now());
        Ok(session)
    }

    fn init_phase(
        &mut self,
        pipeline: &mut P,
        config: &PipelineConfig,
        key: &StreamKey,
        phase: StartupPhase,
    ) -> PipelineResult<()> {
        match phase {
            StartupPhase::InitLibrary => self.init_library(pipeline, config),
            StartupPhase::InitVideo => self.init_video(pipeline, config),
            StartupPhase::InitAudio => self.init_audio(pipeline, config),
            StartupPhase::CreateService => self.create_service(pipeline, config, key),
            StartupPhase::CreateOutput => self.create_output(pipeline, config),
            StartupPhase::StartOutput => self.start_output(pipeline),
        }
    }

    fn init_library(&mut self, pipeline: &mut P, config: &PipelineConfig) -> PipelineResult<()> {
        pipeline.startup(&config.locale)?;
        self.library_started = true;

        pipeline.load_all_modules();

        if config.log_available_types {
            log_available_types(&*pipeline);
        }

        debug!(locale = %config.locale, "Library initialized");
        Ok(())
    }

    fn init_video(&mut self, pipeline: &mut P, config: &PipelineConfig) -> PipelineResult<()> {
        let video = &config.video;
        pipeline.reset_video(video)?;

        let source = pipeline.create_source(&video.source_id, "")?;
        pipeline.set_output_source(VIDEO_CHANNEL, Some(&source));
        self.video_source = Some(source);

        let encoder = pipeline.create_video_encoder(&video.encoder_id, "")?;
        pipeline.attach_video(&encoder);
        self.video_encoder = Some(encoder);

        debug!(source = %video.source_id, encoder = %video.encoder_id, "Video initialized");
        Ok(())
    }

    fn init_audio(&mut self, pipeline: &mut P, config: &PipelineConfig) -> PipelineResult<()> {
        let audio = &config.audio;
        pipeline.reset_audio(audio)?;

        let source = pipeline.create_source(&audio.source_id, "")?;
        pipeline.set_output_source(AUDIO_CHANNEL, Some(&source));
        self.audio_source = Some(source);

        let encoder = pipeline.create_audio_encoder(&audio.encoder_id, "", audio.mixer_index)?;
        pipeline.attach_audio(&encoder);
        self.audio_encoder = Some(encoder);

        debug!(source = %audio.source_id, encoder = %audio.encoder_id, "Audio initialized");
        Ok(())
    }

    fn create_service(
        &mut self,
        pipeline: &mut P,
        config: &PipelineConfig,
        key: &StreamKey,
    ) -> PipelineResult<()> {
        let settings = &config.service;
        let data = ServiceData::for_stream(settings, key);

        self.service = Some(pipeline.create_service(&settings.id, &settings.name, &data)?);

        debug!(service = %settings.service, server = %settings.server, "Service created");
        Ok(())
    }

    fn create_output(&mut self, pipeline: &mut P, config: &PipelineConfig) -> PipelineResult<()> {
        let output = pipeline.create_output(&config.output.id, "")?;

        // Earlier phases succeeded, so all three are present.
        if let (Some(video), Some(audio), Some(service)) =
            (&self.video_encoder, &self.audio_encoder, &self.service)
        {
            pipeline.connect_output(&output, video, audio, config.audio.track, service);
        }

        self.output = Some(output);
        debug!(output = %config.output.id, "Output created");
        Ok(())
    }

    fn start_output(&mut self, pipeline: &mut P) -> PipelineResult<()> {
        if let Some(output) = &self.output {
            pipeline.start_output(output)?;
            self.output_started = true;
        }
        Ok(())
    }

    /// Stop the output, release every handle and shut the library down.
    #[instrument(name = "session_close", skip_all)]
    pub fn close(mut self, pipeline: &mut P) {
        let mut phase = ShutdownPhase::FIRST;

        loop {
            debug!("{}", phase.name());
            self.shutdown_phase(pipeline, phase);

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        if let Some(uptime) = self.uptime() {
            info!(uptime_secs = uptime.as_secs_f32(), "Session closed");
        }
    }

    fn shutdown_phase(&mut self, pipeline: &mut P, phase: ShutdownPhase) {
        match phase {
            ShutdownPhase::StopOutput => {
                if let Some(output) = self.output.take() {
                    if self.output_started {
                        pipeline.stop_output(&output);
                        self.output_started = false;
                    }
                    pipeline.release_output(output);
                }
            }
            ShutdownPhase::ReleaseService => {
                if let Some(service) = self.service.take() {
                    pipeline.release_service(service);
                }
            }
            ShutdownPhase::ReleaseEncoders => {
                if let Some(encoder) = self.audio_encoder.take() {
                    pipeline.release_encoder(encoder);
                }
                if let Some(encoder) = self.video_encoder.take() {
                    pipeline.release_encoder(encoder);
                }
            }
            ShutdownPhase::ReleaseSources => {
                if let Some(source) = self.audio_source.take() {
                    pipeline.set_output_source(AUDIO_CHANNEL, None);
                    pipeline.release_source(source);
                }
                if let Some(source) = self.video_source.take() {
                    pipeline.set_output_source(VIDEO_CHANNEL, None);
                    pipeline.release_source(source);
                }
            }
            ShutdownPhase::ShutdownLibrary => {
                if self.library_started {
                    pipeline.shutdown();
                    self.library_started = false;
                }
            }
        }
    }

    /// The output handle.
    pub fn output(&self) -> Option<&P::Output> {
        self.output.as_ref()
    }

    /// Whether the library reports the output as running.
    pub fn output_active(&self, pipeline: &P) -> bool {
        self.output
            .as_ref()
            .is_some_and(|output| pipeline.output_active(output))
    }

    /// Time since the output was started.
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}
