//! Shared helpers for the integration suites.

#![allow(dead_code)]

use promissory::{LabTimeline, Promise, PromiseState, Rejection, Resolution, TimelineHandle};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Builds a lab timeline plus the handle promises are constructed over.
pub fn lab() -> (Arc<LabTimeline>, TimelineHandle) {
    let lab = Arc::new(LabTimeline::new());
    let handle: TimelineHandle = lab.clone();
    (lab, handle)
}

/// Installs a test subscriber so `RUST_LOG` controls engine trace output.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An order-preserving event recorder shared with observer callbacks.
pub fn recorder<V: Send + 'static>(
) -> (Arc<Mutex<Vec<V>>>, impl Fn(V) + Send + Sync + Clone + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value| {
        sink.lock().expect("recorder lock poisoned").push(value);
    })
}

/// Drains a recorder into a plain vector.
pub fn taken<V: Clone>(seen: &Arc<Mutex<Vec<V>>>) -> Vec<V> {
    seen.lock().expect("recorder lock poisoned").clone()
}

/// A promise that fulfills with `value` after `delay` virtual ticks.
pub fn fulfill_after<T, E>(
    lab: &Arc<LabTimeline>,
    handle: &TimelineHandle,
    delay: u64,
    value: T,
) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let (settler, promise) = Promise::deferred(handle);
    lab.schedule_after(
        delay,
        Box::new(move || settler.resolve(Resolution::Value(value))),
    );
    promise
}

/// A promise that rejects with `reason` after `delay` virtual ticks.
pub fn reject_after<T, E>(
    lab: &Arc<LabTimeline>,
    handle: &TimelineHandle,
    delay: u64,
    reason: Rejection<E>,
) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let (settler, promise) = Promise::deferred(handle);
    lab.schedule_after(delay, Box::new(move || settler.reject(reason)));
    promise
}

/// Spin-waits until `promise` settles or `timeout` elapses; returns the
/// final state. For wall-clock suites only — lab suites drain explicitly.
pub fn wait_settled<T, E>(promise: &Promise<T, E>, timeout: Duration) -> PromiseState
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let deadline = Instant::now() + timeout;
    while promise.state().is_pending() && Instant::now() < deadline {
        std::thread::yield_now();
    }
    promise.state()
}
