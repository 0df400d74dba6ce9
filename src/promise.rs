//! Settlement core: the promise state machine and the chaining operator.
//!
//! A [`Promise`] is a cheap clonable handle to shared settlement state:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        SETTLEMENT CORE                           │
//! │                                                                  │
//! │   Pending ──resolve──► Resolution Procedure ──value──► Fulfilled │
//! │      │                                                           │
//! │      └───────────────────reject─────────────────────► Rejected   │
//! │                                                                  │
//! │   The transition happens at most once. Observer queues are       │
//! │   drained exactly then; later observers schedule immediately.    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Observer callbacks are never invoked synchronously by registration or by
//! settlement; they are handed to the promise's timeline and run on a later
//! turn, in registration order. That holds even when an observer is
//! registered on an already-settled promise, so a caller can always attach
//! [`then`](Promise::then) after construction without racing the
//! initializer.
//!
//! Settlement capabilities are an explicit handle object, [`Settler`],
//! passed into the initializer and returned by
//! [`deferred`](Promise::deferred) the way a oneshot channel returns its
//! sender half.

use crate::adopt::{self, Resolution};
use crate::error::{PanicPayload, Rejection};
use crate::timeline::{Job, TimelineHandle};
use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Observable lifecycle state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a rejection reason.
    Rejected,
}

impl PromiseState {
    /// Returns true if the promise has not settled.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true if the promise settled with a value.
    #[must_use]
    pub const fn is_fulfilled(self) -> bool {
        matches!(self, Self::Fulfilled)
    }

    /// Returns true if the promise settled with a rejection.
    #[must_use]
    pub const fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Returns a human-readable name for the state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a chained handler produced: a resolution to adopt, or a rejection.
pub type HandlerOutcome<T, E> = Result<Resolution<T, E>, Rejection<E>>;

enum State<T, E> {
    Pending {
        fulfill_queue: Vec<Box<dyn FnOnce(T) + Send>>,
        reject_queue: Vec<Box<dyn FnOnce(Rejection<E>) + Send>>,
    },
    Fulfilled(T),
    Rejected(Rejection<E>),
}

impl<T, E> State<T, E> {
    const fn tag(&self) -> PromiseState {
        match self {
            Self::Pending { .. } => PromiseState::Pending,
            Self::Fulfilled(_) => PromiseState::Fulfilled,
            Self::Rejected(_) => PromiseState::Rejected,
        }
    }
}

pub(crate) struct Inner<T, E> {
    state: Mutex<State<T, E>>,
    timeline: TimelineHandle,
}

impl<T, E> Inner<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn new(timeline: TimelineHandle) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::Pending {
                fulfill_queue: Vec::new(),
                reject_queue: Vec::new(),
            }),
            timeline,
        })
    }

    /// Terminal transition to `Fulfilled`. No-op unless pending.
    ///
    /// Only the Resolution Procedure calls this with a value it has reduced
    /// to a plain `T`; everything else goes through [`adopt::adopt`].
    ///
    /// The queued observers are handed to the timeline here, in
    /// registration order, each as a zero-argument job with the settled
    /// value baked in; the rejection queue is discarded.
    pub(crate) fn settle_fulfilled(this: &Arc<Self>, value: T) {
        let callbacks = {
            let mut state = this.state.lock().expect("promise lock poisoned");
            if !matches!(&*state, State::Pending { .. }) {
                return;
            }
            let previous = mem::replace(&mut *state, State::Fulfilled(value.clone()));
            match previous {
                State::Pending { fulfill_queue, .. } => fulfill_queue,
                _ => Vec::new(),
            }
        };
        trace!(observers = callbacks.len(), "promise fulfilled");
        for callback in callbacks {
            let value = value.clone();
            this.timeline.schedule_later(Box::new(move || callback(value)));
        }
    }

    /// Terminal transition to `Rejected`. No-op unless pending.
    pub(crate) fn settle_rejected(this: &Arc<Self>, reason: Rejection<E>) {
        let callbacks = {
            let mut state = this.state.lock().expect("promise lock poisoned");
            if !matches!(&*state, State::Pending { .. }) {
                return;
            }
            let previous = mem::replace(&mut *state, State::Rejected(reason.clone()));
            match previous {
                State::Pending { reject_queue, .. } => reject_queue,
                _ => Vec::new(),
            }
        };
        trace!(observers = callbacks.len(), "promise rejected");
        for callback in callbacks {
            let reason = reason.clone();
            this.timeline.schedule_later(Box::new(move || callback(reason)));
        }
    }

    /// Registers both observers. If pending, they are queued; if settled,
    /// the matching one is scheduled immediately. Neither ever runs
    /// synchronously here.
    pub(crate) fn subscribe(
        this: &Arc<Self>,
        on_fulfilled: Box<dyn FnOnce(T) + Send>,
        on_rejected: Box<dyn FnOnce(Rejection<E>) + Send>,
    ) {
        let immediate: Option<Job> = {
            let mut state = this.state.lock().expect("promise lock poisoned");
            match &mut *state {
                State::Pending {
                    fulfill_queue,
                    reject_queue,
                } => {
                    fulfill_queue.push(on_fulfilled);
                    reject_queue.push(on_rejected);
                    None
                }
                State::Fulfilled(value) => {
                    let value = value.clone();
                    Some(Box::new(move || on_fulfilled(value)))
                }
                State::Rejected(reason) => {
                    let reason = reason.clone();
                    Some(Box::new(move || on_rejected(reason)))
                }
            }
        };
        if let Some(job) = immediate {
            this.timeline.schedule_later(job);
        }
    }

    fn state_tag(this: &Arc<Self>) -> PromiseState {
        this.state.lock().expect("promise lock poisoned").tag()
    }
}

/// Feeds a handler's outcome (including a caught unwind) into the derived
/// promise.
fn settle_from_handler<T, E>(
    target: &Arc<Inner<T, E>>,
    outcome: std::thread::Result<HandlerOutcome<T, E>>,
) where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    match outcome {
        Ok(Ok(resolution)) => adopt::adopt(target, resolution),
        Ok(Err(rejection)) => Inner::settle_rejected(target, rejection),
        Err(payload) => Inner::settle_rejected(
            target,
            Rejection::Panicked(PanicPayload::from_unwind(payload)),
        ),
    }
}

/// A deferred value that settles exactly once.
///
/// Cloning a `Promise` clones the handle, not the state: all clones observe
/// the same settlement.
pub struct Promise<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.inner.state.lock().expect("promise lock poisoned").tag();
        f.debug_struct("Promise").field("state", &tag).finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Runs `init` synchronously with the new promise's [`Settler`].
    ///
    /// An `Err` return or a panic inside `init` rejects the promise (caught
    /// once, after any settlement `init` already performed); neither
    /// propagates to the caller.
    pub fn new<F>(timeline: &TimelineHandle, init: F) -> Self
    where
        F: FnOnce(Settler<T, E>) -> Result<(), E>,
    {
        let inner = Inner::new(Arc::clone(timeline));
        let settler = Settler {
            target: Arc::clone(&inner),
        };
        let fallback = settler.clone();
        match catch_unwind(AssertUnwindSafe(move || init(settler))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => fallback.reject(Rejection::Error(error)),
            Err(payload) => {
                fallback.reject(Rejection::Panicked(PanicPayload::from_unwind(payload)));
            }
        }
        Self { inner }
    }

    /// Creates a promise adopting `resolution`: already fulfilled for a
    /// plain value, mirroring the source for a promise or thenable.
    pub fn resolve(timeline: &TimelineHandle, resolution: Resolution<T, E>) -> Self {
        let inner = Inner::new(Arc::clone(timeline));
        adopt::adopt(&inner, resolution);
        Self { inner }
    }

    /// Creates an already-rejected promise.
    pub fn reject(timeline: &TimelineHandle, reason: Rejection<E>) -> Self {
        let inner = Inner::new(Arc::clone(timeline));
        Inner::settle_rejected(&inner, reason);
        Self { inner }
    }

    /// Creates a pending promise together with its settlement handle, for
    /// settling from outside an initializer (conformance suites, manual
    /// wiring, combinators).
    #[must_use]
    pub fn deferred(timeline: &TimelineHandle) -> (Settler<T, E>, Self) {
        let inner = Inner::new(Arc::clone(timeline));
        (
            Settler {
                target: Arc::clone(&inner),
            },
            Self { inner },
        )
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        Inner::state_tag(&self.inner)
    }

    /// Returns a clone of the fulfillment value, if fulfilled.
    #[must_use]
    pub fn try_value(&self) -> Option<T> {
        match &*self.inner.state.lock().expect("promise lock poisoned") {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns a clone of the rejection reason, if rejected.
    #[must_use]
    pub fn try_rejection(&self) -> Option<Rejection<E>> {
        match &*self.inner.state.lock().expect("promise lock poisoned") {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Registers both observers. The matching one eventually runs exactly
    /// once with the settled value or reason; neither runs synchronously,
    /// even on an already-settled promise.
    pub fn subscribe<F, G>(&self, on_fulfilled: F, on_rejected: G)
    where
        F: FnOnce(T) + Send + 'static,
        G: FnOnce(Rejection<E>) + Send + 'static,
    {
        Inner::subscribe(&self.inner, Box::new(on_fulfilled), Box::new(on_rejected));
    }

    /// Derives a new promise from this one through a fulfillment handler.
    ///
    /// A rejection of this promise passes through to the derived promise
    /// unchanged (the missing rejection handler rethrows). The handler's
    /// `Ok` resolution is adopted by the derived promise; an `Err` or a
    /// panic rejects it.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> HandlerOutcome<U, E> + Send + 'static,
    {
        self.derive(Box::new(on_fulfilled), Box::new(|reason| Err(reason)))
    }

    /// Derives a new promise through a rejection handler; a fulfillment
    /// passes through unchanged (the missing fulfillment handler is the
    /// identity).
    pub fn catch<F>(&self, on_rejected: F) -> Promise<T, E>
    where
        F: FnOnce(Rejection<E>) -> HandlerOutcome<T, E> + Send + 'static,
    {
        self.derive(
            Box::new(|value| Ok(Resolution::Value(value))),
            Box::new(on_rejected),
        )
    }

    /// Derives a new promise through both handlers at once.
    pub fn then_catch<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> HandlerOutcome<U, E> + Send + 'static,
        G: FnOnce(Rejection<E>) -> HandlerOutcome<U, E> + Send + 'static,
    {
        self.derive(Box::new(on_fulfilled), Box::new(on_rejected))
    }

    /// Runs `on_finally` with no arguments on settlement of either kind.
    ///
    /// The original outcome passes through unchanged; if `on_finally`
    /// panics, that failure replaces the outcome.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T, E>
    where
        F: FnOnce() + Send + 'static,
    {
        // One callback, two observer branches; only the branch that runs
        // may consume it.
        let cell = Arc::new(Mutex::new(Some(on_finally)));
        let for_rejection = Arc::clone(&cell);
        self.derive(
            Box::new(move |value| {
                let callback = cell.lock().expect("finally cell poisoned").take();
                if let Some(callback) = callback {
                    callback();
                }
                Ok(Resolution::Value(value))
            }),
            Box::new(move |reason| {
                let callback = for_rejection.lock().expect("finally cell poisoned").take();
                if let Some(callback) = callback {
                    callback();
                }
                Err(reason)
            }),
        )
    }

    fn derive<U>(
        &self,
        on_fulfilled: Box<dyn FnOnce(T) -> HandlerOutcome<U, E> + Send>,
        on_rejected: Box<dyn FnOnce(Rejection<E>) -> HandlerOutcome<U, E> + Send>,
    ) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
    {
        let derived = Inner::new(Arc::clone(&self.inner.timeline));
        let on_value_target = Arc::clone(&derived);
        let on_reason_target = Arc::clone(&derived);
        Inner::subscribe(
            &self.inner,
            Box::new(move |value| {
                let outcome = catch_unwind(AssertUnwindSafe(move || on_fulfilled(value)));
                settle_from_handler(&on_value_target, outcome);
            }),
            Box::new(move |reason| {
                let outcome = catch_unwind(AssertUnwindSafe(move || on_rejected(reason)));
                settle_from_handler(&on_reason_target, outcome);
            }),
        );
        Promise { inner: derived }
    }

    pub(crate) fn inner(&self) -> &Arc<Inner<T, E>> {
        &self.inner
    }
}

/// The settlement pair for one promise: the fulfill capability (which
/// routes through the Resolution Procedure) and the reject capability.
///
/// Cloning shares the same underlying promise; only the first effective
/// settlement, through any clone, has effect.
pub struct Settler<T, E> {
    target: Arc<Inner<T, E>>,
}

impl<T, E> Clone for Settler<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
        }
    }
}

impl<T, E> fmt::Debug for Settler<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self
            .target
            .state
            .lock()
            .expect("promise lock poisoned")
            .tag();
        f.debug_struct("Settler").field("state", &tag).finish()
    }
}

impl<T, E> Settler<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Resolves the promise with `resolution`.
    ///
    /// A plain value fulfills directly; a promise or thenable is adopted,
    /// and only the terminal plain value settles the promise. No-op if the
    /// promise is already settled or an adoption is already pending.
    pub fn resolve(&self, resolution: Resolution<T, E>) {
        adopt::adopt(&self.target, resolution);
    }

    /// Rejects the promise with `reason`. No-op if already settled.
    pub fn reject(&self, reason: Rejection<E>) {
        Inner::settle_rejected(&self.target, reason);
    }

    /// Returns the current lifecycle state of the governed promise.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        Inner::state_tag(&self.target)
    }
}
