//! Query results as reported by an engine.
//!
//! Bindings never construct a [`QueryResult`] themselves; they relay whatever the
//! engine hands them. The builders here exist for engine implementations.

use crate::error::FetchError;
use crate::key::{QueryHash, QueryKey};
use crate::options::TrackedProp;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Error,
    Success,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Error => "error",
            QueryStatus::Success => "success",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Fetching,
    Idle,
}

/// Snapshot of a query's state for one observer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub is_fetching: bool,
    pub data: Option<Value>,
    pub error: Option<FetchError>,
    pub data_updated_at: Option<DateTime<Utc>>,
    pub error_updated_at: Option<DateTime<Utc>>,
    pub key: QueryKey,
    pub query_hash: QueryHash,
}

impl QueryResult {
    /// Initial result for a query with nothing cached.
    pub fn pending(key: QueryKey) -> Self {
        let query_hash = key.fingerprint();
        Self {
            status: QueryStatus::Pending,
            fetch_status: FetchStatus::Idle,
            is_fetching: false,
            data: None,
            error: None,
            data_updated_at: None,
            error_updated_at: None,
            key,
            query_hash,
        }
    }

    pub fn with_fetch_status(mut self, fetch_status: FetchStatus) -> Self {
        self.fetch_status = fetch_status;
        self.is_fetching = fetch_status == FetchStatus::Fetching;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// Neither pending nor fetching.
    pub fn is_settled(&self) -> bool {
        !self.is_pending() && !self.is_fetching
    }

    /// Whether any of `props` differs between the two results. `None` compares all fields.
    pub fn differs(&self, other: &QueryResult, props: Option<&[TrackedProp]>) -> bool {
        if self.query_hash != other.query_hash {
            return true;
        }
        let props = props.unwrap_or(&TrackedProp::ALL[..]);
        props.iter().any(|prop| match prop {
            TrackedProp::Status => self.status != other.status,
            TrackedProp::FetchStatus => self.fetch_status != other.fetch_status,
            TrackedProp::Data => self.data != other.data,
            TrackedProp::Error => self.error != other.error,
            TrackedProp::UpdatedAt => {
                self.data_updated_at != other.data_updated_at
                    || self.error_updated_at != other.error_updated_at
            }
        })
    }
}
