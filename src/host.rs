//! Host Reactivity
//!
//! The minimal reactive host a binding runs inside: [`Signal`]s that record reads,
//! [`watch`] effects that re-run when those reads change, and [`Element`]s that
//! carry local state, a cleanup hook and an error channel. Engines are provided on
//! an element and resolved from its nearest ancestor.

mod effect;
mod element;
mod signal;

pub use effect::{untracked, watch, Effect, EffectInner, Trackable};
pub use element::{Element, ErrorChannel, LocalState, LocalValue, WeakElement};
pub use signal::Signal;
