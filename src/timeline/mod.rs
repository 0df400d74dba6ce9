//! The scheduling timeline: a single injectable deferral capability.
//!
//! Every observer callback a promise dispatches goes through
//! [`Schedule::schedule_later`], never through a direct call. That one
//! capability is what makes the engine's ordering guarantees hold:
//!
//! - callbacks for a given promise drain in FIFO registration order,
//! - a callback never runs before its promise is settled,
//! - a callback runs at most once,
//! - registering an observer never invokes it synchronously, even when the
//!   promise is already settled.
//!
//! Two timelines are provided:
//!
//! - [`LabTimeline`]: a deterministic virtual-time queue for tests. Jobs run
//!   only when the caller drains them; timers fire only when the caller
//!   advances the clock, in `(deadline, registration)` order.
//! - [`WallTimeline`]: a wall-clock timer thread for production-shaped use.
//!   `schedule_later` is a zero-delay timer; `schedule_after` is the
//!   `setTimeout` analogue.
//!
//! There is no cancellation primitive: once a job is scheduled it runs to
//! completion (or is abandoned wholesale when a [`WallTimeline`] is dropped).

use std::sync::Arc;

mod lab;
mod wall;

pub use lab::LabTimeline;
pub use wall::WallTimeline;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The deferral capability a promise graph is constructed over.
///
/// Implementations must preserve submission order between jobs scheduled
/// from the same thread; the engine relies on that for per-promise FIFO
/// drain.
pub trait Schedule: Send + Sync {
    /// Enqueues a job to run on a later turn of the timeline.
    fn schedule_later(&self, job: Job);
}

/// Shared handle to a timeline.
pub type TimelineHandle = Arc<dyn Schedule>;
