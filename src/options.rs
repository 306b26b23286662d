//! Layered query options
//!
//! Options resolve in four layers, lowest to highest: crate defaults, client defaults
//! ([`QueryDefaults`]), the key computed by the descriptor builder, and the caller's
//! [`QueryOptionsPatch`]. Each patch field that is set replaces the lower layer's value.

use crate::descriptor::QueryFn;
use crate::key::{QueryHash, QueryKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether an observer should report an immediately-available result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticMode {
    #[default]
    Off,
    Optimistic,
}

/// Listener notification policy for an option push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    Listeners,
    Silent,
}

/// Result fields an observer can scope its change detection to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedProp {
    Status,
    FetchStatus,
    Data,
    Error,
    UpdatedAt,
}

impl TrackedProp {
    pub const ALL: [TrackedProp; 5] = [
        TrackedProp::Status,
        TrackedProp::FetchStatus,
        TrackedProp::Data,
        TrackedProp::Error,
        TrackedProp::UpdatedAt,
    ];
}

/// Process-wide defaults held by an engine client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefaults {
    pub enabled: bool,
    pub stale_time: Duration,
    pub notify_on_change_props: Option<Vec<TrackedProp>>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: Duration::ZERO,
            notify_on_change_props: None,
        }
    }
}

/// Fully resolved options for one query observer
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub key: QueryKey,
    pub query_fn: QueryFn,
    pub enabled: bool,
    pub stale_time: Duration,
    pub optimistic: OptimisticMode,
    pub notify_on_change_props: Option<Vec<TrackedProp>>,
}

impl QueryOptions {
    pub fn new(key: QueryKey, query_fn: QueryFn) -> Self {
        Self::from_defaults(&QueryDefaults::default(), key, query_fn)
    }

    pub fn from_defaults(defaults: &QueryDefaults, key: QueryKey, query_fn: QueryFn) -> Self {
        Self {
            key,
            query_fn,
            enabled: defaults.enabled,
            stale_time: defaults.stale_time,
            optimistic: OptimisticMode::Off,
            notify_on_change_props: defaults.notify_on_change_props.clone(),
        }
    }

    /// Overlay every field the patch sets.
    pub fn apply(mut self, patch: &QueryOptionsPatch) -> Self {
        if let Some(key) = &patch.key {
            self.key = key.clone();
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(stale_time) = patch.stale_time {
            self.stale_time = stale_time;
        }
        if let Some(props) = &patch.notify_on_change_props {
            self.notify_on_change_props = Some(props.clone());
        }
        self
    }

    pub fn with_optimistic(mut self, mode: OptimisticMode) -> Self {
        self.optimistic = mode;
        self
    }

    pub fn fingerprint(&self) -> QueryHash {
        self.key.fingerprint()
    }
}

/// Caller-supplied option overrides; unset fields defer to lower layers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptionsPatch {
    pub key: Option<QueryKey>,
    pub enabled: Option<bool>,
    pub stale_time: Option<Duration>,
    pub notify_on_change_props: Option<Vec<TrackedProp>>,
}

impl QueryOptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: QueryKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn notify_on_change_props(mut self, props: Vec<TrackedProp>) -> Self {
        self.notify_on_change_props = Some(props);
        self
    }

    /// Combine two patches; fields set in `over` win.
    pub fn merged(&self, over: &QueryOptionsPatch) -> QueryOptionsPatch {
        QueryOptionsPatch {
            key: over.key.clone().or_else(|| self.key.clone()),
            enabled: over.enabled.or(self.enabled),
            stale_time: over.stale_time.or(self.stale_time),
            notify_on_change_props: over
                .notify_on_change_props
                .clone()
                .or_else(|| self.notify_on_change_props.clone()),
        }
    }
}
