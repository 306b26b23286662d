//! Writes query results into an element's local state.

use crate::host::{LocalState, LocalValue};
use crate::result::QueryResult;
use tracing::trace;

/// Local state property a binding writes to unless told otherwise
pub const DEFAULT_PROPERTY: &str = "query";

/// Destination for a session's results: one named property in local state
#[derive(Debug, Clone)]
pub struct ResultSink {
    state: LocalState,
    property: String,
}

impl ResultSink {
    pub fn new(state: LocalState, property: impl Into<String>) -> Self {
        Self {
            state,
            property: property.into(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Replace the property's value with `result`.
    pub fn write(&self, result: QueryResult) {
        trace!(
            property = %self.property,
            status = result.status.as_str(),
            fetching = result.is_fetching,
            "Writing query result"
        );
        self.state.set(&self.property, LocalValue::Query(result));
    }

    /// The last result written, if any.
    pub fn latest(&self) -> Option<QueryResult> {
        self.state.query(&self.property)
    }
}
