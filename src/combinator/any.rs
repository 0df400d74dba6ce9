//! Any combinator: first fulfillment wins, rejections aggregate.

use crate::adopt::Resolution;
use crate::error::{AggregateError, Rejection};
use crate::promise::Promise;
use crate::timeline::TimelineHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fulfills with the first value any input fulfills with. Rejects only
/// once every input has rejected, with an [`AggregateError`] holding each
/// reason in input order.
///
/// Empty input rejects immediately with an empty aggregate.
pub fn any<T, E, I>(timeline: &TimelineHandle, inputs: I) -> Promise<T, AggregateError<E>>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let inputs: Vec<_> = inputs.into_iter().collect();
    let (settler, promise) = Promise::deferred(timeline);

    if inputs.is_empty() {
        settler.reject(Rejection::Error(AggregateError::new(Vec::new())));
        return promise;
    }

    let remaining = Arc::new(AtomicUsize::new(inputs.len()));
    let reasons: Arc<Mutex<Vec<Option<Rejection<E>>>>> =
        Arc::new(Mutex::new((0..inputs.len()).map(|_| None).collect()));

    for (index, input) in inputs.into_iter().enumerate() {
        let on_value = settler.clone();
        let on_reason = settler.clone();
        let remaining = Arc::clone(&remaining);
        let reasons = Arc::clone(&reasons);
        Promise::resolve(timeline, input).then_catch(
            move |value| {
                on_value.resolve(Resolution::Value(value));
                Ok(Resolution::Value(()))
            },
            move |reason| {
                reasons.lock().expect("any reasons lock poisoned")[index] = Some(reason);
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    let collected: Vec<Rejection<E>> = reasons
                        .lock()
                        .expect("any reasons lock poisoned")
                        .iter_mut()
                        .map(|slot| slot.take().expect("every input rejected before aggregation"))
                        .collect();
                    on_reason.reject(Rejection::Error(AggregateError::new(collected)));
                }
                Ok(Resolution::Value(()))
            },
        );
    }

    promise
}
