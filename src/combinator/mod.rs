//! Aggregate combinators composing many promises into one.
//!
//! - [`all`]: fulfill with every value in input order, or reject with the
//!   first observed reason
//! - [`race`]: settle with whichever input settles first
//! - [`any`]: fulfill with the first fulfillment, or reject with an
//!   aggregate of every reason in input order
//! - [`all_settled`]: always fulfill, with a status-tagged record per input
//!
//! Every combinator takes a sequence of [`Resolution`]s, so plain values
//! are accepted alongside promises and thenables and are treated as already
//! fulfilled. A non-sequence argument is a compile-time type error; there
//! is deliberately no coercion of a bare value into a one-element sequence.
//!
//! Combinators are pure consumers of the public operations
//! ([`Promise::deferred`], [`Promise::resolve`],
//! [`Promise::then_catch`]) — they hold no access to settlement internals.
//!
//! [`Resolution`]: crate::adopt::Resolution
//! [`Promise::deferred`]: crate::promise::Promise::deferred
//! [`Promise::resolve`]: crate::promise::Promise::resolve
//! [`Promise::then_catch`]: crate::promise::Promise::then_catch

mod all;
mod all_settled;
mod any;
mod race;

pub use all::all;
pub use all_settled::all_settled;
pub use any::any;
pub use race::race;
