//! Loadable module exposing start/stop streaming to Twitch.
//!
//! The host calls `obsStartStreamToTwitch(streamKey)` and
//! `obsStopStreamToTwitch()` through the C ABI in [`ffi`]. Exports are only
//! built with the `libobs` feature, which links the media library.

mod commands;
mod config;
mod error;
pub mod exit;
pub mod ffi;

pub use commands::{parse_stream_key, ControllerSlot};
pub use config::{load_config, load_from_path, CONFIG_ENV};
pub use error::{ArgumentError, BridgeError, Status, MESSAGE_PREFIX};

use std::sync::{Once, OnceLock};

use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obs_twitch_types::PipelineConfig;

/// Names of the host-facing entry points.
pub const EXPORTS: [&str; 2] = ["obsStartStreamToTwitch", "obsStopStreamToTwitch"];

static INIT: Once = Once::new();
static CONFIG: OnceLock<PipelineConfig> = OnceLock::new();

/// Initialize logging. A subscriber installed by the host wins.
///
/// Returns whether this module's subscriber was installed.
fn init_logging() -> bool {
    let installed = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "obs_twitch_stream_node=debug,obs_twitch_engine=debug,obs_twitch_pipeline=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match installed {
        Ok(()) => true,
        Err(e) => {
            debug!("Keeping existing tracing subscriber: {}", e);
            false
        }
    }
}

/// One-time module setup: logging, then configuration. Later calls are no-ops.
pub fn init_module() {
    INIT.call_once(|| {
        init_logging();
        info!(exports = ?EXPORTS, "Module init called");
        pipeline_config();
    });
}

/// Configuration for new sessions, loaded on first use.
pub fn pipeline_config() -> &'static PipelineConfig {
    CONFIG.get_or_init(load_config)
}
