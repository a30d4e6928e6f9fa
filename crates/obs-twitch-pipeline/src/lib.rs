//! Media pipeline abstraction over libobs.
//!
//! The [`MediaPipeline`] trait is the seam between the session controller
//! and the media library. `ObsPipeline` (feature `libobs`) drives the real
//! library through its C API; `RecordingPipeline` (feature `testing`) is an
//! in-memory stand-in that records every call.

mod error;
#[cfg(any(test, feature = "testing"))]
mod fake;
#[cfg(feature = "libobs")]
mod obs;

pub use error::{ObjectKind, PipelineError};
#[cfg(any(test, feature = "testing"))]
pub use fake::{FailPoint, FakeHandle, PipelineCall, RecordingHandle, RecordingPipeline};
#[cfg(feature = "libobs")]
pub use obs::{ObsEncoder, ObsOutput, ObsPipeline, ObsService, ObsSource};

use std::fmt;

use obs_twitch_types::{AudioSettings, ServiceSettings, StreamKey, VideoSettings};

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Families of registered types the library can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Input,
    Output,
    Source,
    Encoder,
    Service,
}

impl TypeKind {
    /// All families, in listing order.
    pub const ALL: [TypeKind; 5] = [
        TypeKind::Input,
        TypeKind::Output,
        TypeKind::Source,
        TypeKind::Encoder,
        TypeKind::Service,
    ];

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "Input type",
            Self::Output => "Output type",
            Self::Source => "Source type",
            Self::Encoder => "Encoder type",
            Self::Service => "Service type",
        }
    }
}

/// String settings handed to a service at creation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceData {
    entries: Vec<(String, String)>,
}

impl ServiceData {
    /// Settings for a streaming service: `service`, `key` and `server`.
    pub fn for_stream(settings: &ServiceSettings, key: &StreamKey) -> Self {
        let mut data = Self::default();
        data.set("service", &settings.service);
        data.set("key", key.expose());
        data.set("server", &settings.server);
        data
    }

    /// Set a string entry, replacing an existing one with the same name.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Look an entry up by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl fmt::Debug for ServiceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.entries() {
            if name == "key" {
                map.entry(&name, &"<redacted>");
            } else {
                map.entry(&name, &value);
            }
        }
        map.finish()
    }
}

/// Operations the session controller needs from the media library.
///
/// Handles are owned values: the `release_*` methods consume them, so a
/// handle cannot be used after it has been given back to the library.
pub trait MediaPipeline: Send {
    /// Capture source handle.
    type Source: Send;

    /// Encoder handle (audio or video).
    type Encoder: Send;

    /// Streaming service handle.
    type Service: Send;

    /// Output handle.
    type Output: Send;

    /// Bring up the library's global state.
    fn startup(&mut self, locale: &str) -> PipelineResult<()>;

    /// Load every available plugin module.
    fn load_all_modules(&mut self);

    /// List the registered type ids of one family.
    fn available_types(&self, kind: TypeKind) -> Vec<String>;

    /// Reset the global video pipeline.
    fn reset_video(&mut self, settings: &VideoSettings) -> PipelineResult<()>;

    /// Reset the global audio pipeline.
    fn reset_audio(&mut self, settings: &AudioSettings) -> PipelineResult<()>;

    /// Create a source of the given type.
    fn create_source(&mut self, id: &str, name: &str) -> PipelineResult<Self::Source>;

    /// Bind a source to an output channel, or clear the channel.
    fn set_output_source(&mut self, channel: u32, source: Option<&Self::Source>);

    /// Release a source.
    fn release_source(&mut self, source: Self::Source);

    /// Create a video encoder of the given type.
    fn create_video_encoder(&mut self, id: &str, name: &str) -> PipelineResult<Self::Encoder>;

    /// Create an audio encoder reading from the given mixer.
    fn create_audio_encoder(
        &mut self,
        id: &str,
        name: &str,
        mixer_index: usize,
    ) -> PipelineResult<Self::Encoder>;

    /// Feed an encoder from the global video pipeline.
    fn attach_video(&mut self, encoder: &Self::Encoder);

    /// Feed an encoder from the global audio pipeline.
    fn attach_audio(&mut self, encoder: &Self::Encoder);

    /// Release an encoder.
    fn release_encoder(&mut self, encoder: Self::Encoder);

    /// Create a service from string settings. The settings object built for
    /// the call does not outlive it.
    fn create_service(
        &mut self,
        id: &str,
        name: &str,
        settings: &ServiceData,
    ) -> PipelineResult<Self::Service>;

    /// Release a service.
    fn release_service(&mut self, service: Self::Service);

    /// Create an output of the given type.
    fn create_output(&mut self, id: &str, name: &str) -> PipelineResult<Self::Output>;

    /// Wire encoders and service into an output.
    fn connect_output(
        &mut self,
        output: &Self::Output,
        video: &Self::Encoder,
        audio: &Self::Encoder,
        track: usize,
        service: &Self::Service,
    );

    /// Start an output.
    fn start_output(&mut self, output: &Self::Output) -> PipelineResult<()>;

    /// Whether an output is currently running.
    fn output_active(&self, output: &Self::Output) -> bool;

    /// Stop an output.
    fn stop_output(&mut self, output: &Self::Output);

    /// Release an output.
    fn release_output(&mut self, output: Self::Output);

    /// Tear down the library's global state.
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_service_data() {
        let key = StreamKey::new("live_abc").unwrap();
        let data = ServiceData::for_stream(&ServiceSettings::default(), &key);

        let entries: Vec<_> = data.entries().collect();
        assert_eq!(
            entries,
            vec![("service", "Twitch"), ("key", "live_abc"), ("server", "auto")]
        );
    }

    #[test]
    fn test_service_data_debug_hides_key() {
        let key = StreamKey::new("live_abc").unwrap();
        let data = ServiceData::for_stream(&ServiceSettings::default(), &key);

        let debug = format!("{data:?}");
        assert!(debug.contains("Twitch"));
        assert!(!debug.contains("live_abc"));
    }

    #[test]
    fn test_set_replaces_existing_entry() {
        let mut data = ServiceData::default();
        data.set("server", "auto");
        data.set("server", "rtmp://example/app");
        assert_eq!(data.get("server"), Some("rtmp://example/app"));
        assert_eq!(data.entries().count(), 1);
    }
}
