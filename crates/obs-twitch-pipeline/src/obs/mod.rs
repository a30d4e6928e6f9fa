//! libobs-backed pipeline.

use std::ffi::{CStr, CString};
use std::mem;
use std::os::raw::c_char;
use std::ptr::{self, NonNull};

use libobs as ffi;

use tracing::{debug, instrument, trace, warn};

use obs_twitch_types::{
    AudioSettings, ColorRange, ColorSpace, ScaleType, SpeakerLayout, VideoFormat, VideoSettings,
};

use crate::error::{ObjectKind, PipelineError};
use crate::{MediaPipeline, PipelineResult, ServiceData, TypeKind};

macro_rules! obs_handle {
    ($(#[$meta:meta])* $name:ident, $raw:ty) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name(NonNull<$raw>);

        impl $name {
            fn as_ptr(&self) -> *mut $raw {
                self.0.as_ptr()
            }
        }

        // SAFETY: libobs objects are reference counted and guard their own
        // state; the handle only moves the owning reference between threads.
        unsafe impl Send for $name {}
    };
}

obs_handle!(
    /// Owned reference to an `obs_source_t`.
    ObsSource,
    ffi::obs_source_t
);
obs_handle!(
    /// Owned reference to an `obs_encoder_t`.
    ObsEncoder,
    ffi::obs_encoder_t
);
obs_handle!(
    /// Owned reference to an `obs_service_t`.
    ObsService,
    ffi::obs_service_t
);
obs_handle!(
    /// Owned reference to an `obs_output_t`.
    ObsOutput,
    ffi::obs_output_t
);

/// Settings object released when dropped.
struct ObsData(NonNull<ffi::obs_data_t>);

impl ObsData {
    fn from_service_data(data: &ServiceData) -> PipelineResult<Self> {
        let entries = data
            .entries()
            .map(|(name, value)| {
                Ok((
                    c_string("service setting name", name)?,
                    c_string("service setting", value)?,
                ))
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        // SAFETY: obs_data_create has no preconditions.
        let raw = unsafe { ffi::obs_data_create() };
        let this = NonNull::new(raw).map(ObsData).ok_or(PipelineError::NotInitialized)?;

        for (name, value) in &entries {
            // SAFETY: both strings outlive the call; libobs copies them.
            unsafe { ffi::obs_data_set_string(this.0.as_ptr(), name.as_ptr(), value.as_ptr()) };
        }

        Ok(this)
    }
}

impl Drop for ObsData {
    fn drop(&mut self) {
        // SAFETY: we hold the only reference created by obs_data_create.
        unsafe { ffi::obs_data_release(self.0.as_ptr()) };
    }
}

fn c_string(field: &'static str, value: &str) -> PipelineResult<CString> {
    CString::new(value).map_err(|_| PipelineError::InvalidString { field })
}

fn created<T>(raw: *mut T, kind: ObjectKind, id: &str) -> PipelineResult<NonNull<T>> {
    NonNull::new(raw).ok_or_else(|| PipelineError::CreateFailed {
        kind,
        id: id.to_string(),
    })
}

type EnumTypesFn = unsafe extern "C" fn(usize, *mut *const c_char) -> bool;

fn enum_types(next: EnumTypesFn) -> Vec<String> {
    let mut ids = Vec::new();

    for idx in 0.. {
        let mut id: *const c_char = ptr::null();
        // SAFETY: `id` is a valid out pointer; libobs writes a static string.
        if !unsafe { next(idx, &mut id) } {
            break;
        }
        if !id.is_null() {
            // SAFETY: non-null ids point to NUL-terminated module strings.
            ids.push(unsafe { CStr::from_ptr(id) }.to_string_lossy().into_owned());
        }
    }

    ids
}

// obs_reset_video return codes; the bindings expose the defines untyped.
const VIDEO_SUCCESS: i32 = ffi::OBS_VIDEO_SUCCESS as i32;
const VIDEO_FAIL: i32 = ffi::OBS_VIDEO_FAIL as i32;
const VIDEO_NOT_SUPPORTED: i32 = ffi::OBS_VIDEO_NOT_SUPPORTED as i32;
const VIDEO_INVALID_PARAM: i32 = ffi::OBS_VIDEO_INVALID_PARAM as i32;
const VIDEO_CURRENTLY_ACTIVE: i32 = ffi::OBS_VIDEO_CURRENTLY_ACTIVE as i32;
const VIDEO_MODULE_NOT_FOUND: i32 = ffi::OBS_VIDEO_MODULE_NOT_FOUND as i32;

fn video_reset_reason(code: i32) -> &'static str {
    match code {
        VIDEO_FAIL => "generic failure",
        VIDEO_NOT_SUPPORTED => "graphics adapter not supported",
        VIDEO_INVALID_PARAM => "invalid parameter",
        VIDEO_CURRENTLY_ACTIVE => "video is currently active",
        VIDEO_MODULE_NOT_FOUND => "graphics module not found",
        _ => "unknown error",
    }
}

fn raw_format(format: VideoFormat) -> ffi::video_format {
    match format {
        VideoFormat::I420 => ffi::video_format_VIDEO_FORMAT_I420,
        VideoFormat::Nv12 => ffi::video_format_VIDEO_FORMAT_NV12,
        VideoFormat::I444 => ffi::video_format_VIDEO_FORMAT_I444,
        VideoFormat::Rgba => ffi::video_format_VIDEO_FORMAT_RGBA,
        VideoFormat::Bgra => ffi::video_format_VIDEO_FORMAT_BGRA,
    }
}

fn raw_colorspace(colorspace: ColorSpace) -> ffi::video_colorspace {
    match colorspace {
        ColorSpace::Default => ffi::video_colorspace_VIDEO_CS_DEFAULT,
        ColorSpace::Bt601 => ffi::video_colorspace_VIDEO_CS_601,
        ColorSpace::Bt709 => ffi::video_colorspace_VIDEO_CS_709,
    }
}

fn raw_range(range: ColorRange) -> ffi::video_range_type {
    match range {
        ColorRange::Default => ffi::video_range_type_VIDEO_RANGE_DEFAULT,
        ColorRange::Partial => ffi::video_range_type_VIDEO_RANGE_PARTIAL,
        ColorRange::Full => ffi::video_range_type_VIDEO_RANGE_FULL,
    }
}

fn raw_scale(scale: ScaleType) -> ffi::obs_scale_type {
    match scale {
        ScaleType::Disable => ffi::obs_scale_type_OBS_SCALE_DISABLE,
        ScaleType::Point => ffi::obs_scale_type_OBS_SCALE_POINT,
        ScaleType::Bicubic => ffi::obs_scale_type_OBS_SCALE_BICUBIC,
        ScaleType::Bilinear => ffi::obs_scale_type_OBS_SCALE_BILINEAR,
        ScaleType::Lanczos => ffi::obs_scale_type_OBS_SCALE_LANCZOS,
        ScaleType::Area => ffi::obs_scale_type_OBS_SCALE_AREA,
    }
}

fn raw_speakers(speakers: SpeakerLayout) -> ffi::speaker_layout {
    match speakers {
        SpeakerLayout::Mono => ffi::speaker_layout_SPEAKERS_MONO,
        SpeakerLayout::Stereo => ffi::speaker_layout_SPEAKERS_STEREO,
    }
}

/// Pipeline driving the process-wide libobs instance.
///
/// libobs keeps its state in globals, so only one `ObsPipeline` should be
/// started at a time.
#[derive(Debug, Default)]
pub struct ObsPipeline {
    started: bool,
}

impl ObsPipeline {
    /// Create a pipeline; the library is brought up by [`MediaPipeline::startup`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaPipeline for ObsPipeline {
    type Source = ObsSource;
    type Encoder = ObsEncoder;
    type Service = ObsService;
    type Output = ObsOutput;

    #[instrument(name = "obs_startup", skip(self))]
    fn startup(&mut self, locale: &str) -> PipelineResult<()> {
        let c_locale = c_string("locale", locale)?;

        // SAFETY: a null config path and profiler store select the defaults.
        let ok = unsafe { ffi::obs_startup(c_locale.as_ptr(), ptr::null(), ptr::null_mut()) };
        if !ok {
            return Err(PipelineError::StartupFailed {
                locale: locale.to_string(),
            });
        }

        self.started = true;
        debug!("libobs started");
        Ok(())
    }

    fn load_all_modules(&mut self) {
        // SAFETY: called after a successful startup.
        unsafe { ffi::obs_load_all_modules() };
        debug!("libobs modules loaded");
    }

    fn available_types(&self, kind: TypeKind) -> Vec<String> {
        let next: EnumTypesFn = match kind {
            TypeKind::Input => ffi::obs_enum_input_types,
            TypeKind::Output => ffi::obs_enum_output_types,
            TypeKind::Source => ffi::obs_enum_source_types,
            TypeKind::Encoder => ffi::obs_enum_encoder_types,
            TypeKind::Service => ffi::obs_enum_service_types,
        };
        enum_types(next)
    }

    #[instrument(name = "obs_reset_video", skip_all)]
    fn reset_video(&mut self, settings: &VideoSettings) -> PipelineResult<()> {
        let graphics_module = c_string("graphics module", &settings.graphics_module)?;

        // SAFETY: plain C struct; all-zero is a valid value for every field,
        // including ones newer headers add.
        let mut ovi: ffi::obs_video_info = unsafe { mem::zeroed() };
        ovi.graphics_module = graphics_module.as_ptr();
        ovi.fps_num = settings.fps_num;
        ovi.fps_den = settings.fps_den;
        ovi.base_width = settings.base_width;
        ovi.base_height = settings.base_height;
        ovi.output_width = settings.output_width;
        ovi.output_height = settings.output_height;
        ovi.output_format = raw_format(settings.output_format);
        ovi.adapter = settings.adapter;
        ovi.gpu_conversion = settings.gpu_conversion;
        ovi.colorspace = raw_colorspace(settings.colorspace);
        ovi.range = raw_range(settings.range);
        ovi.scale_type = raw_scale(settings.scale_type);

        // SAFETY: `ovi` and the module name it points to live across the call.
        let code = unsafe { ffi::obs_reset_video(&mut ovi) };
        if code != VIDEO_SUCCESS {
            return Err(PipelineError::VideoResetFailed {
                code,
                reason: video_reset_reason(code),
            });
        }

        debug!(
            width = settings.output_width,
            height = settings.output_height,
            fps_num = settings.fps_num,
            fps_den = settings.fps_den,
            "Video reset"
        );
        Ok(())
    }

    #[instrument(name = "obs_reset_audio", skip_all)]
    fn reset_audio(&mut self, settings: &AudioSettings) -> PipelineResult<()> {
        // SAFETY: plain C struct; all-zero is a valid value.
        let mut oai: ffi::obs_audio_info = unsafe { mem::zeroed() };
        oai.samples_per_sec = settings.samples_per_sec;
        oai.speakers = raw_speakers(settings.speakers);

        // SAFETY: `oai` lives across the call.
        if !unsafe { ffi::obs_reset_audio(&oai) } {
            return Err(PipelineError::AudioResetFailed);
        }

        debug!(samples_per_sec = settings.samples_per_sec, "Audio reset");
        Ok(())
    }

    fn create_source(&mut self, id: &str, name: &str) -> PipelineResult<ObsSource> {
        let (c_id, c_name) = (c_string("type id", id)?, c_string("object name", name)?);
        // SAFETY: null settings and hotkey data select the type defaults.
        let raw = unsafe {
            ffi::obs_source_create(c_id.as_ptr(), c_name.as_ptr(), ptr::null_mut(), ptr::null_mut())
        };
        created(raw, ObjectKind::Source, id).map(ObsSource)
    }

    fn set_output_source(&mut self, channel: u32, source: Option<&ObsSource>) {
        let raw = source.map_or(ptr::null_mut(), ObsSource::as_ptr);
        // SAFETY: libobs takes its own reference; null clears the channel.
        unsafe { ffi::obs_set_output_source(channel, raw) };
    }

    fn release_source(&mut self, source: ObsSource) {
        trace!("Releasing source");
        // SAFETY: consumes the reference returned by obs_source_create.
        unsafe { ffi::obs_source_release(source.as_ptr()) };
    }

    fn create_video_encoder(&mut self, id: &str, name: &str) -> PipelineResult<ObsEncoder> {
        let (c_id, c_name) = (c_string("type id", id)?, c_string("object name", name)?);
        // SAFETY: null settings and hotkey data select the type defaults.
        let raw = unsafe {
            ffi::obs_video_encoder_create(
                c_id.as_ptr(),
                c_name.as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        created(raw, ObjectKind::VideoEncoder, id).map(ObsEncoder)
    }

    fn create_audio_encoder(
        &mut self,
        id: &str,
        name: &str,
        mixer_index: usize,
    ) -> PipelineResult<ObsEncoder> {
        let (c_id, c_name) = (c_string("type id", id)?, c_string("object name", name)?);
        // SAFETY: null settings and hotkey data select the type defaults.
        let raw = unsafe {
            ffi::obs_audio_encoder_create(
                c_id.as_ptr(),
                c_name.as_ptr(),
                ptr::null_mut(),
                mixer_index,
                ptr::null_mut(),
            )
        };
        created(raw, ObjectKind::AudioEncoder, id).map(ObsEncoder)
    }

    fn attach_video(&mut self, encoder: &ObsEncoder) {
        // SAFETY: the global video pipeline exists after a successful reset.
        unsafe { ffi::obs_encoder_set_video(encoder.as_ptr(), ffi::obs_get_video()) };
    }

    fn attach_audio(&mut self, encoder: &ObsEncoder) {
        // SAFETY: the global audio pipeline exists after a successful reset.
        unsafe { ffi::obs_encoder_set_audio(encoder.as_ptr(), ffi::obs_get_audio()) };
    }

    fn release_encoder(&mut self, encoder: ObsEncoder) {
        trace!("Releasing encoder");
        // SAFETY: consumes the reference returned by obs_*_encoder_create.
        unsafe { ffi::obs_encoder_release(encoder.as_ptr()) };
    }

    #[instrument(name = "obs_create_service", skip(self, settings))]
    fn create_service(
        &mut self,
        id: &str,
        name: &str,
        settings: &ServiceData,
    ) -> PipelineResult<ObsService> {
        let (c_id, c_name) = (c_string("type id", id)?, c_string("object name", name)?);
        let data = ObsData::from_service_data(settings)?;

        // SAFETY: the service copies what it needs from `data`, which is
        // released when it goes out of scope below.
        let raw = unsafe {
            ffi::obs_service_create(c_id.as_ptr(), c_name.as_ptr(), data.0.as_ptr(), ptr::null_mut())
        };
        drop(data);

        created(raw, ObjectKind::Service, id).map(ObsService)
    }

    fn release_service(&mut self, service: ObsService) {
        trace!("Releasing service");
        // SAFETY: consumes the reference returned by obs_service_create.
        unsafe { ffi::obs_service_release(service.as_ptr()) };
    }

    fn create_output(&mut self, id: &str, name: &str) -> PipelineResult<ObsOutput> {
        let (c_id, c_name) = (c_string("type id", id)?, c_string("object name", name)?);
        // SAFETY: null settings and hotkey data select the type defaults.
        let raw = unsafe {
            ffi::obs_output_create(c_id.as_ptr(), c_name.as_ptr(), ptr::null_mut(), ptr::null_mut())
        };
        created(raw, ObjectKind::Output, id).map(ObsOutput)
    }

    fn connect_output(
        &mut self,
        output: &ObsOutput,
        video: &ObsEncoder,
        audio: &ObsEncoder,
        track: usize,
        service: &ObsService,
    ) {
        // SAFETY: all handles are live; the output takes its own references.
        unsafe {
            ffi::obs_output_set_video_encoder(output.as_ptr(), video.as_ptr());
            ffi::obs_output_set_audio_encoder(output.as_ptr(), audio.as_ptr(), track);
            ffi::obs_output_set_service(output.as_ptr(), service.as_ptr());
        }
    }

    fn start_output(&mut self, output: &ObsOutput) -> PipelineResult<()> {
        // SAFETY: the output is live and fully wired.
        if unsafe { ffi::obs_output_start(output.as_ptr()) } {
            return Ok(());
        }

        // SAFETY: the returned string is owned by the output and copied here.
        let message = unsafe {
            let raw = ffi::obs_output_get_last_error(output.as_ptr());
            (!raw.is_null()).then(|| CStr::from_ptr(raw).to_string_lossy().into_owned())
        };
        Err(PipelineError::OutputStartFailed { message })
    }

    fn output_active(&self, output: &ObsOutput) -> bool {
        // SAFETY: the output is live.
        unsafe { ffi::obs_output_active(output.as_ptr()) }
    }

    fn stop_output(&mut self, output: &ObsOutput) {
        // SAFETY: stopping an inactive output is a no-op in libobs.
        unsafe { ffi::obs_output_stop(output.as_ptr()) };
    }

    fn release_output(&mut self, output: ObsOutput) {
        trace!("Releasing output");
        // SAFETY: consumes the reference returned by obs_output_create.
        unsafe { ffi::obs_output_release(output.as_ptr()) };
    }

    #[instrument(name = "obs_shutdown", skip(self))]
    fn shutdown(&mut self) {
        // SAFETY: obs_initialized has no preconditions.
        if !unsafe { ffi::obs_initialized() } {
            warn!("Shutdown requested but libobs is not initialized");
            self.started = false;
            return;
        }

        // SAFETY: every handle created by this pipeline has been released.
        unsafe { ffi::obs_shutdown() };
        self.started = false;
        debug!("libobs shut down");
    }
}

impl Drop for ObsPipeline {
    fn drop(&mut self) {
        if self.started {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_video_maps_to_libobs_values() {
        let video = VideoSettings::default();
        assert_eq!(raw_format(video.output_format), ffi::video_format_VIDEO_FORMAT_I420);
        assert_eq!(raw_colorspace(video.colorspace), ffi::video_colorspace_VIDEO_CS_DEFAULT);
        assert_eq!(raw_range(video.range), ffi::video_range_type_VIDEO_RANGE_DEFAULT);
        assert_eq!(raw_scale(video.scale_type), ffi::obs_scale_type_OBS_SCALE_BILINEAR);
        assert_eq!(
            raw_speakers(AudioSettings::default().speakers),
            ffi::speaker_layout_SPEAKERS_STEREO
        );
    }

    #[test]
    fn test_interior_nul_error_hides_value() {
        let err = c_string("service setting", "live_secret\0tail").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidString {
                field: "service setting"
            }
        ));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_service_data_with_nul_is_rejected_before_library_call() {
        let mut data = ServiceData::default();
        data.set("key", "live_secret\0tail");
        let err = ObsData::from_service_data(&data).map(|_| ()).unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_video_reset_reasons() {
        assert_eq!(video_reset_reason(-5), "graphics module not found");
        assert_eq!(video_reset_reason(-42), "unknown error");
    }
}
