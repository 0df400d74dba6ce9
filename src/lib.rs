//! Promissory: a deferred-value ("promise") resolution engine.
//!
//! # Overview
//!
//! A [`Promise`] represents the eventual result of an operation that
//! completes exactly once. Observers may attach before or after completion
//! and always run exactly once, deferred to a later turn of the scheduling
//! timeline, in registration order. Resolution is recursive: resolving
//! with another promise — or with any foreign [`Thenable`] — adopts that
//! source's eventual outcome instead of treating it as a value.
//!
//! # Core Guarantees
//!
//! - **Settle-once**: a promise leaves `Pending` at most once; later
//!   settlement attempts are no-ops
//! - **Deferred dispatch**: no observer ever runs synchronously inside
//!   registration, construction, or settlement
//! - **FIFO drain**: a promise's observers run in registration order
//! - **No escaping failures**: initializer, handler, and foreign-thenable
//!   panics are caught and become rejections
//! - **Deterministic testing**: the lab timeline runs the whole engine on
//!   virtual time
//!
//! # Module Structure
//!
//! - [`promise`]: settlement core, the `then`/`catch`/`finally` chaining
//!   operators, and the [`Settler`] settlement handle
//! - [`adopt`]: the resolution procedure and the [`Thenable`] seam for
//!   foreign future-like values
//! - [`combinator`]: `all`, `race`, `any`, `all_settled`
//! - [`timeline`]: the injectable `schedule_later` capability with lab
//!   (virtual time) and wall-clock implementations
//! - [`error`]: rejection reasons and panic payloads
//! - [`outcome`]: status-tagged settlement records

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod adopt;
pub mod combinator;
pub mod error;
pub mod outcome;
pub mod promise;
pub mod timeline;

// Re-exports for convenient access to core types
pub use adopt::{OnRejected, OnResolved, Resolution, Thenable};
pub use combinator::{all, all_settled, any, race};
pub use error::{AggregateError, PanicPayload, Rejection};
pub use outcome::SettledOutcome;
pub use promise::{HandlerOutcome, Promise, PromiseState, Settler};
pub use timeline::{Job, LabTimeline, Schedule, TimelineHandle, WallTimeline};
