//! Error types for query bindings.
//!
//! Two families exist. [`BindError`] covers setup and descriptor failures that are
//! raised synchronously to the host. [`FetchError`] covers transport failures; it is
//! never returned across the binding boundary and only travels inside a
//! [`QueryResult`](crate::result::QueryResult).

use serde::Serialize;
use thiserror::Error;

/// Binding and setup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("Invalid query descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Query engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Expression evaluation failed: {0}")]
    Expression(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for BindError {
    fn from(err: config::ConfigError) -> Self {
        BindError::ConfigError(err.to_string())
    }
}

/// Transport errors, delivered as part of a query result
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

// Maps reqwest failures onto the fetch taxonomy
impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            FetchError::Status {
                status: status.as_u16(),
                body: error.to_string(),
            }
        } else if error.is_timeout() {
            FetchError::Timeout(error.to_string())
        } else if error.is_connect() {
            FetchError::Connect(error.to_string())
        } else if error.is_decode() {
            FetchError::Decode(error.to_string())
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}
