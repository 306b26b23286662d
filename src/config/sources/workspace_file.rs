//! Per-workspace files under `config/`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};

const ENV_VAR: &str = "QUERYBIND_ENV";
const DEFAULT_ENV: &str = "development";

/// Active environment name, from `QUERYBIND_ENV`.
pub fn environment_name() -> String {
    std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENV.to_string())
}

/// `config/config.toml` then `config/{env}.toml`, whichever exist.
pub fn existing_paths(workspace_root: &Path) -> Vec<PathBuf> {
    let config_dir = workspace_root.join("config");
    [
        config_dir.join("config.toml"),
        config_dir.join(format!("{}.toml", environment_name())),
    ]
    .into_iter()
    .filter(|path| path.exists())
    .collect()
}

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(existing_paths(workspace_root)
        .into_iter()
        .fold(builder, |builder, path| builder.add_source(File::from(path))))
}
