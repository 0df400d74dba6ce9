//! The resolution procedure: reducing a candidate value to a settlement.
//!
//! Whenever a promise is resolved — by its settler, by an initializer, or
//! by a chained handler's return value — the candidate is a
//! [`Resolution`]: a plain value, a native promise, or a foreign
//! [`Thenable`]. The procedure reduces it to a single terminal settlement
//! of the target promise:
//!
//! 1. A promise that is the target itself rejects the target with
//!    [`Rejection::Cycle`].
//! 2. A native promise is observed; its fulfillment re-enters the
//!    procedure, its rejection rejects the target. This unwraps
//!    arbitrarily nested promises.
//! 3. A thenable is invoked with two callbacks sharing one first-call
//!    latch. Foreign code is untrusted: it may call both callbacks, call
//!    one repeatedly, call from another thread, panic, or never call
//!    either. Exactly the first invocation (if any) has effect, and a
//!    panic before the latch fires rejects the target.
//! 4. A plain value fulfills the target directly.

use crate::error::{PanicPayload, Rejection};
use crate::promise::{Inner, Promise};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Callback a [`Thenable`] uses to yield a resolution.
///
/// Shared (`Arc<dyn Fn>`) because foreign code may clone, stash, and call
/// it as often as it likes; the engine's latch makes only the first call
/// effective.
pub type OnResolved<T, E> = Arc<dyn Fn(Resolution<T, E>) + Send + Sync>;

/// Callback a [`Thenable`] uses to signal failure. Same latch discipline
/// as [`OnResolved`].
pub type OnRejected<E> = Arc<dyn Fn(Rejection<E>) + Send + Sync>;

/// A foreign future-like value: anything that can eventually call one of
/// two callbacks.
///
/// Closures of the matching shape implement this automatically, so a test
/// or an adapter can write `Resolution::Thenable(Box::new(|resolve, reject|
/// ...))`.
pub trait Thenable<T, E>: Send {
    /// Drives the foreign computation. The implementation may call either
    /// callback, both, repeatedly, never, or panic; the engine tolerates
    /// all of it.
    fn then(self: Box<Self>, on_resolved: OnResolved<T, E>, on_rejected: OnRejected<E>);
}

impl<T, E, F> Thenable<T, E> for F
where
    F: FnOnce(OnResolved<T, E>, OnRejected<E>) + Send,
{
    fn then(self: Box<Self>, on_resolved: OnResolved<T, E>, on_rejected: OnRejected<E>) {
        (*self)(on_resolved, on_rejected);
    }
}

/// A candidate value for resolving a promise.
///
/// The explicit variant tag replaces duck-typed probing: a plain value
/// settles directly, a native promise or foreign thenable is adopted.
pub enum Resolution<T, E> {
    /// A plain value; fulfills the target directly.
    Value(T),
    /// A native promise; the target mirrors its outcome.
    Promise(Promise<T, E>),
    /// A foreign future-like value, adopted under the latch discipline.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Returns true for a plain value.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true for a native promise.
    #[must_use]
    pub const fn is_promise(&self) -> bool {
        matches!(self, Self::Promise(_))
    }

    /// Returns true for a foreign thenable.
    #[must_use]
    pub const fn is_thenable(&self) -> bool {
        matches!(self, Self::Thenable(_))
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Self::Promise(promise)
    }
}

impl<T, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Value(_) => "Resolution::Value",
            Self::Promise(_) => "Resolution::Promise",
            Self::Thenable(_) => "Resolution::Thenable",
        })
    }
}

/// Adopts `candidate` into `target`, per the module-level procedure.
pub(crate) fn adopt<T, E>(target: &Arc<Inner<T, E>>, candidate: Resolution<T, E>)
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    match candidate {
        Resolution::Promise(source) if Arc::ptr_eq(source.inner(), target) => {
            debug!("circular resolution detected");
            Inner::settle_rejected(target, Rejection::Cycle);
        }
        Resolution::Promise(source) => {
            trace!("adopting native promise");
            let on_value_target = Arc::clone(target);
            let on_reason_target = Arc::clone(target);
            Inner::subscribe(
                source.inner(),
                Box::new(move |value| adopt(&on_value_target, Resolution::Value(value))),
                Box::new(move |reason| Inner::settle_rejected(&on_reason_target, reason)),
            );
        }
        Resolution::Thenable(thenable) => {
            trace!("invoking foreign thenable");
            let latch = Arc::new(AtomicBool::new(false));

            let resolve_target = Arc::clone(target);
            let resolve_latch = Arc::clone(&latch);
            let on_resolved: OnResolved<T, E> = Arc::new(move |yielded| {
                if !resolve_latch.swap(true, Ordering::SeqCst) {
                    adopt(&resolve_target, yielded);
                }
            });

            let reject_target = Arc::clone(target);
            let reject_latch = Arc::clone(&latch);
            let on_rejected: OnRejected<E> = Arc::new(move |reason| {
                if !reject_latch.swap(true, Ordering::SeqCst) {
                    Inner::settle_rejected(&reject_target, reason);
                }
            });

            let invoked =
                catch_unwind(AssertUnwindSafe(move || thenable.then(on_resolved, on_rejected)));
            if let Err(payload) = invoked {
                if !latch.swap(true, Ordering::SeqCst) {
                    Inner::settle_rejected(
                        target,
                        Rejection::Panicked(PanicPayload::from_unwind(payload)),
                    );
                }
            }
        }
        Resolution::Value(value) => Inner::settle_fulfilled(target, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{LabTimeline, TimelineHandle};

    fn lab() -> (Arc<LabTimeline>, TimelineHandle) {
        let lab = Arc::new(LabTimeline::new());
        let handle: TimelineHandle = lab.clone();
        (lab, handle)
    }

    #[test]
    fn plain_value_fulfills_directly() {
        let (_lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(&handle, Resolution::Value(4));
        assert_eq!(promise.try_value(), Some(4));
    }

    #[test]
    fn nested_promises_unwrap() {
        let (lab, handle) = lab();
        let innermost = Promise::<i32, &str>::resolve(&handle, Resolution::Value(4));
        let middle = Promise::resolve(&handle, Resolution::Promise(innermost));
        let outer = Promise::resolve(&handle, Resolution::Promise(middle));
        lab.run_until_idle();
        assert_eq!(outer.try_value(), Some(4));
    }

    #[test]
    fn adopted_rejection_propagates() {
        let (lab, handle) = lab();
        let source = Promise::<i32, &str>::reject(&handle, Rejection::Error("boom"));
        let target = Promise::resolve(&handle, Resolution::Promise(source));
        lab.run_until_idle();
        assert_eq!(target.try_rejection(), Some(Rejection::Error("boom")));
    }

    #[test]
    fn self_resolution_rejects_with_cycle() {
        let (lab, handle) = lab();
        let (settler, promise) = Promise::<i32, &str>::deferred(&handle);
        settler.resolve(Resolution::Promise(promise.clone()));
        lab.run_until_idle();
        assert_eq!(promise.try_rejection(), Some(Rejection::Cycle));
    }

    #[test]
    fn thenable_fulfills_target() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |resolve: OnResolved<i32, &str>, _reject: OnRejected<&str>| {
                    resolve(Resolution::Value(8));
                },
            )),
        );
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(8));
    }

    #[test]
    fn thenable_rejects_target() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |_resolve: OnResolved<i32, &str>, reject: OnRejected<&str>| {
                    reject(Rejection::Error("foreign failure"));
                },
            )),
        );
        lab.run_until_idle();
        assert_eq!(
            promise.try_rejection(),
            Some(Rejection::Error("foreign failure"))
        );
    }

    #[test]
    fn thenable_first_call_wins_across_both_callbacks() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |resolve: OnResolved<i32, &str>, reject: OnRejected<&str>| {
                    resolve(Resolution::Value(1));
                    reject(Rejection::Error("ignored"));
                    resolve(Resolution::Value(2));
                },
            )),
        );
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(1));
    }

    #[test]
    fn thenable_repeated_rejections_keep_first() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |_resolve: OnResolved<i32, &str>, reject: OnRejected<&str>| {
                    reject(Rejection::Error("first"));
                    reject(Rejection::Error("second"));
                },
            )),
        );
        lab.run_until_idle();
        assert_eq!(promise.try_rejection(), Some(Rejection::Error("first")));
    }

    #[test]
    fn thenable_panic_before_latch_rejects() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |_resolve: OnResolved<i32, &str>, _reject: OnRejected<&str>| {
                    panic!("foreign code exploded");
                },
            )),
        );
        lab.run_until_idle();
        match promise.try_rejection() {
            Some(Rejection::Panicked(payload)) => {
                assert_eq!(payload.message(), "foreign code exploded");
            }
            other => panic!("expected panic rejection, got {other:?}"),
        }
    }

    #[test]
    fn thenable_panic_after_latch_is_ignored() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |resolve: OnResolved<i32, &str>, _reject: OnRejected<&str>| {
                    resolve(Resolution::Value(3));
                    panic!("too late to matter");
                },
            )),
        );
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(3));
    }

    #[test]
    fn thenable_that_never_calls_leaves_target_pending() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |_resolve: OnResolved<i32, &str>, _reject: OnRejected<&str>| {},
            )),
        );
        lab.run_until_idle();
        assert!(promise.state().is_pending());
    }

    #[test]
    fn thenable_yielding_thenable_recurses() {
        let (lab, handle) = lab();
        let promise = Promise::<i32, &str>::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                |resolve: OnResolved<i32, &str>, _reject: OnRejected<&str>| {
                    resolve(Resolution::Thenable(Box::new(
                        |inner_resolve: OnResolved<i32, &str>, _: OnRejected<&str>| {
                            inner_resolve(Resolution::Value(21));
                        },
                    )));
                },
            )),
        );
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(21));
    }

    #[test]
    fn thenable_yielding_promise_adopts_it() {
        let (lab, handle) = lab();
        let (settler, source) = Promise::<i32, &'static str>::deferred(&handle);
        let promise = Promise::resolve(
            &handle,
            Resolution::Thenable(Box::new(
                move |resolve: OnResolved<i32, &'static str>, _reject: OnRejected<&'static str>| {
                    resolve(Resolution::Promise(source));
                },
            )),
        );
        lab.run_until_idle();
        assert!(promise.state().is_pending());

        settler.resolve(Resolution::Value(30));
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(30));
    }

    #[test]
    fn resolution_classifiers_and_debug() {
        let value: Resolution<i32, &str> = Resolution::Value(1);
        assert!(value.is_value());
        assert_eq!(format!("{value:?}"), "Resolution::Value");

        let (_lab, handle) = lab();
        let promise: Resolution<i32, &str> =
            Promise::resolve(&handle, Resolution::Value(1)).into();
        assert!(promise.is_promise());
    }
}
