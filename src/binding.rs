//! Query Binding
//!
//! The bridge between a host's reactive expressions and a query engine.
//! [`TriggerAdapter`] evaluates an expression and drives a [`BindingSession`],
//! which holds the engine subscription and writes results through a [`ResultSink`].

mod session;
mod sink;
mod trigger;

pub use session::{BindingSession, SessionState};
pub use sink::{ResultSink, DEFAULT_PROPERTY};
pub use trigger::{EvalContext, Expression, TriggerAdapter};
