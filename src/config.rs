//! Configuration System
//!
//! Hierarchical configuration for the engine defaults, transport, binding, and
//! logging. Sources are layered by [`ConfigLoader`]: built-in defaults, the user's
//! global file, workspace files, then `QUERYBIND_*` environment variables.

use crate::error::BindError;
use crate::logging::LoggingConfig;
use crate::options::{QueryDefaults, TrackedProp};
use crate::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerybindConfig {
    /// Process-wide query defaults
    #[serde(default)]
    pub client: ClientConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Binding settings
    #[serde(default)]
    pub binding: BindingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query engine defaults applied to every descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Milliseconds before fetched data counts as stale
    #[serde(default)]
    pub stale_time_ms: u64,

    /// Result fields that trigger listener notifications; all when unset
    #[serde(default)]
    pub notify_on_change_props: Option<Vec<TrackedProp>>,
}

fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time_ms: 0,
            notify_on_change_props: None,
        }
    }
}

impl ClientConfig {
    pub fn defaults(&self) -> QueryDefaults {
        QueryDefaults {
            enabled: self.enabled,
            stale_time: Duration::from_millis(self.stale_time_ms),
            notify_on_change_props: self.notify_on_change_props.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.notify_on_change_props, Some(props) if props.is_empty()) {
            return Err("notify_on_change_props must name at least one field".to_string());
        }
        Ok(())
    }
}

/// Binding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Local state property results are written to
    #[serde(default = "default_property")]
    pub default_property: String,
}

fn default_property() -> String {
    crate::binding::DEFAULT_PROPERTY.to_string()
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            default_property: default_property(),
        }
    }
}

impl BindingConfig {
    pub fn validate(&self) -> Result<(), String> {
        let name = self.default_property.as_str();
        let valid = name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(format!(
                "default_property '{}' is not a valid property name",
                name
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Client(String),
    Transport(String),
    Binding(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Client(msg) => write!(f, "Client: {}", msg),
            ValidationError::Transport(msg) => write!(f, "Transport: {}", msg),
            ValidationError::Binding(msg) => write!(f, "Binding: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl QuerybindConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.client.validate() {
            errors.push(ValidationError::Client(e));
        }
        if let Err(e) = self.transport.validate() {
            errors.push(ValidationError::Transport(e));
        }
        if let Err(e) = self.binding.validate() {
            errors.push(ValidationError::Binding(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every failure into one error.
    pub fn validated(self) -> Result<Self, BindError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            BindError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
