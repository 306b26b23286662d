//! Loader entry points.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::QuerybindConfig;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    ///
    /// Precedence, lowest first: built-in defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{QUERYBIND_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<QuerybindConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: QuerybindConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load a single file over the built-in defaults, ignoring other sources.
    pub fn load_from_file(path: &Path) -> Result<QuerybindConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Path of the global config file, if a home directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
