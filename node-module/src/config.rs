//! Pipeline configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use obs_twitch_types::PipelineConfig;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "OBS_TWITCH_STREAM_CONFIG";

/// Load the configuration named by [`CONFIG_ENV`], falling back to the
/// built-in Twitch defaults when unset or unusable.
pub fn load_config() -> PipelineConfig {
    let Some(path) = env::var_os(CONFIG_ENV) else {
        return PipelineConfig::default();
    };

    match load_from_path(Path::new(&path)) {
        Ok(config) => {
            info!(path = %Path::new(&path).display(), "Loaded pipeline configuration");
            config
        }
        Err(e) => {
            warn!("Using default pipeline configuration: {:#}", e);
            PipelineConfig::default()
        }
    }
}

/// Read, parse and validate a JSON configuration file. Missing fields take
/// their default values.
pub fn load_from_path(path: &Path) -> anyhow::Result<PipelineConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}
