//! querybind: Reactive Query Bindings
//!
//! Connects a host's reactive expressions to an asynchronous query engine. A
//! binding expression produces a query descriptor; the binding keeps one engine
//! subscription per element alive, retargets it whenever the expression's
//! dependencies change, and writes every result into the element's local state.

pub mod binding;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod dispose;
pub mod engine;
pub mod error;
pub mod host;
pub mod key;
pub mod logging;
pub mod options;
pub mod plugin;
pub mod result;
pub mod transport;

pub use binding::{BindingSession, ResultSink, SessionState, TriggerAdapter};
pub use descriptor::{DescriptorBuilder, QueryDescriptor, QueryFn, QueryRequest};
pub use engine::{QueryClient, QueryEngine, QueryObserver};
pub use error::{BindError, FetchError};
pub use key::{KeyPart, QueryHash, QueryKey};
pub use plugin::{install, HostApi, QueryPlugin};
pub use result::{FetchStatus, QueryResult, QueryStatus};
