//! Pipeline configuration.
//!
//! The defaults describe the fixed Twitch pipeline: 1080p30 screen capture
//! encoded with x264, 44.1 kHz stereo audio encoded with AAC, published
//! through the `rtmp_common` service with automatic server selection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration value was rejected before reaching the library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric field that must be positive was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// A type id or name that must be set was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Full configuration of the streaming pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Locale passed to library startup.
    pub locale: String,

    /// Log every registered input/output/source/encoder/service type at startup.
    pub log_available_types: bool,

    /// Video pipeline settings.
    pub video: VideoSettings,

    /// Audio pipeline settings.
    pub audio: AudioSettings,

    /// Streaming service settings.
    pub service: ServiceSettings,

    /// Output settings.
    pub output: OutputSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            log_available_types: true,
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
            service: ServiceSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Check the values the library would otherwise reject deep inside setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_empty("locale", &self.locale)?;

        let video = &self.video;
        non_empty("video.graphics_module", &video.graphics_module)?;
        non_empty("video.source_id", &video.source_id)?;
        non_empty("video.encoder_id", &video.encoder_id)?;
        non_zero("video.fps_num", video.fps_num)?;
        non_zero("video.fps_den", video.fps_den)?;
        non_zero("video.base_width", video.base_width)?;
        non_zero("video.base_height", video.base_height)?;
        non_zero("video.output_width", video.output_width)?;
        non_zero("video.output_height", video.output_height)?;

        let audio = &self.audio;
        non_empty("audio.source_id", &audio.source_id)?;
        non_empty("audio.encoder_id", &audio.encoder_id)?;
        non_zero("audio.samples_per_sec", audio.samples_per_sec)?;

        non_empty("service.id", &self.service.id)?;
        non_empty("service.service", &self.service.service)?;
        non_empty("service.server", &self.service.server)?;
        non_empty("output.id", &self.output.id)?;

        Ok(())
    }
}

fn non_zero(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero(field));
    }
    Ok(())
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty(field));
    }
    Ok(())
}

/// Video reset parameters plus the capture source and encoder to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Graphics backend module loaded by the library.
    pub graphics_module: String,

    /// Frame rate numerator.
    pub fps_num: u32,

    /// Frame rate denominator.
    pub fps_den: u32,

    /// Canvas width in pixels.
    pub base_width: u32,

    /// Canvas height in pixels.
    pub base_height: u32,

    /// Encoded width in pixels.
    pub output_width: u32,

    /// Encoded height in pixels.
    pub output_height: u32,

    /// Pixel format handed to encoders.
    pub output_format: VideoFormat,

    /// Graphics adapter index.
    pub adapter: u32,

    /// Convert color on the GPU.
    pub gpu_conversion: bool,

    /// Output colorspace.
    pub colorspace: ColorSpace,

    /// Output color range.
    pub range: ColorRange,

    /// Scaling filter between canvas and output size.
    pub scale_type: ScaleType,

    /// Screen capture source type id.
    pub source_id: String,

    /// Video encoder type id.
    pub encoder_id: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            graphics_module: "libobs-opengl".to_string(),
            fps_num: 30,
            fps_den: 1,
            base_width: 1920,
            base_height: 1080,
            output_width: 1920,
            output_height: 1080,
            output_format: VideoFormat::I420,
            adapter: 0,
            gpu_conversion: true,
            colorspace: ColorSpace::Default,
            range: ColorRange::Default,
            scale_type: ScaleType::Bilinear,
            source_id: "monitor_capture".to_string(),
            encoder_id: "obs_x264".to_string(),
        }
    }
}

/// Output pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// Planar 4:2:0.
    I420,
    /// Semi-planar 4:2:0.
    Nv12,
    /// Planar 4:4:4.
    I444,
    Rgba,
    Bgra,
}

/// Output colorspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Default,
    Bt601,
    Bt709,
}

/// Output color ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorRange {
    Default,
    Partial,
    Full,
}

/// Scaling filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    Disable,
    Point,
    Bicubic,
    Bilinear,
    Lanczos,
    Area,
}

/// Audio reset parameters plus the capture source and encoder to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Sample rate in Hz.
    pub samples_per_sec: u32,

    /// Channel layout.
    pub speakers: SpeakerLayout,

    /// Audio capture source type id.
    pub source_id: String,

    /// Audio encoder type id.
    pub encoder_id: String,

    /// Mixer the audio encoder reads from.
    pub mixer_index: usize,

    /// Output track the audio encoder is attached to.
    pub track: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            samples_per_sec: 44100,
            speakers: SpeakerLayout::Stereo,
            source_id: "wasapi_input_capture".to_string(),
            encoder_id: "ffmpeg_aac".to_string(),
            mixer_index: 0,
            track: 0,
        }
    }
}

/// Speaker layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerLayout {
    Mono,
    Stereo,
}

/// Streaming service configuration. The stream key is supplied per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service type id.
    pub id: String,

    /// Name given to the created service object.
    pub name: String,

    /// Value of the `service` setting.
    pub service: String,

    /// Value of the `server` setting.
    pub server: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            id: "rtmp_common".to_string(),
            name: "Twitch".to_string(),
            service: "Twitch".to_string(),
            server: "auto".to_string(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Output type id.
    pub id: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            id: "rtmp_output".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_twitch_pipeline() {
        let config = PipelineConfig::default();

        assert_eq!(config.locale, "en-US");
        assert_eq!((config.video.output_width, config.video.output_height), (1920, 1080));
        assert_eq!((config.video.fps_num, config.video.fps_den), (30, 1));
        assert_eq!(config.video.output_format, VideoFormat::I420);
        assert!(config.video.gpu_conversion);
        assert_eq!(config.video.scale_type, ScaleType::Bilinear);
        assert_eq!(config.audio.samples_per_sec, 44100);
        assert_eq!(config.audio.speakers, SpeakerLayout::Stereo);
        assert_eq!(config.service.service, "Twitch");
        assert_eq!(config.service.server, "auto");
        assert_eq!(config.output.id, "rtmp_output");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "video": { "fps_num": 60, "encoder_id": "jim_nvenc" } }"#)
                .unwrap();

        assert_eq!(config.video.fps_num, 60);
        assert_eq!(config.video.encoder_id, "jim_nvenc");
        assert_eq!(config.video.source_id, "monitor_capture");
        assert_eq!(config.audio, AudioSettings::default());
    }

    #[test]
    fn test_validate_rejects_zero_and_empty() {
        let mut config = PipelineConfig::default();
        config.video.fps_den = 0;
        assert_eq!(config.validate(), Err(ConfigError::Zero("video.fps_den")));

        let mut config = PipelineConfig::default();
        config.service.server.clear();
        assert_eq!(config.validate(), Err(ConfigError::Empty("service.server")));
    }
}
