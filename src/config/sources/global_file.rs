//! Global config file source: $XDG_CONFIG_HOME/querybind/config.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::debug;

/// Path to the global config file for the current user.
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "querybind").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the global config file to `builder` if it exists.
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match global_config_path() {
        Some(path) if path.exists() => {
            builder = builder.add_source(File::from(path).required(false));
        }
        Some(path) => {
            debug!(config_path = %path.display(), "No global configuration file");
        }
        None => debug!("No home directory; skipping global configuration"),
    }
    Ok(builder)
}
