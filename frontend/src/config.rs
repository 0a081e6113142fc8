//! Optional user configuration, read from `lumen.toml` in the platform
//! config directory. Command-line flags override everything here.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Window scale factor.
    pub scale: Option<u32>,
    /// Default sandbox directory for the media loader.
    pub media_dir: Option<PathBuf>,
    /// Default sandbox directory for the file gateway.
    pub file_dir: Option<PathBuf>,
}

pub fn config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("lumen").join("lumen.toml"))
}

/// Load the config file if present; parse errors are reported and treated
/// as an empty config rather than aborting startup.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(text) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    match toml::from_str(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("config: ignoring {}: {e}", path.display());
            Config::default()
        }
    }
}
