//! All combinator: every input must fulfill.

use crate::adopt::Resolution;
use crate::promise::Promise;
use crate::timeline::TimelineHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fulfills with every input's value, in input order, once all have
/// fulfilled; rejects with the first observed reason as soon as any input
/// rejects, ignoring the rest.
///
/// Empty input fulfills immediately with an empty vector.
pub fn all<T, E, I>(timeline: &TimelineHandle, inputs: I) -> Promise<Vec<T>, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let inputs: Vec<_> = inputs.into_iter().collect();
    let (settler, promise) = Promise::deferred(timeline);

    if inputs.is_empty() {
        settler.resolve(Resolution::Value(Vec::new()));
        return promise;
    }

    let remaining = Arc::new(AtomicUsize::new(inputs.len()));
    let slots: Arc<Mutex<Vec<Option<T>>>> =
        Arc::new(Mutex::new((0..inputs.len()).map(|_| None).collect()));

    for (index, input) in inputs.into_iter().enumerate() {
        let on_value = settler.clone();
        let on_reason = settler.clone();
        let remaining = Arc::clone(&remaining);
        let slots = Arc::clone(&slots);
        Promise::resolve(timeline, input).then_catch(
            move |value| {
                slots.lock().expect("all slots lock poisoned")[index] = Some(value);
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    let values: Vec<T> = slots
                        .lock()
                        .expect("all slots lock poisoned")
                        .iter_mut()
                        .map(|slot| {
                            slot.take().expect("every input fulfilled before aggregation")
                        })
                        .collect();
                    on_value.resolve(Resolution::Value(values));
                }
                Ok(Resolution::Value(()))
            },
            move |reason| {
                on_reason.reject(reason);
                Ok(Resolution::Value(()))
            },
        );
    }

    promise
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::timeline::LabTimeline;

    fn lab() -> (Arc<LabTimeline>, TimelineHandle) {
        let lab = Arc::new(LabTimeline::new());
        let handle: TimelineHandle = lab.clone();
        (lab, handle)
    }

    #[test]
    fn empty_input_fulfills_with_empty_vec() {
        let (lab, handle) = lab();
        let promise = all::<i32, &str, _>(&handle, Vec::new());
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(Vec::new()));
    }

    #[test]
    fn plain_values_are_treated_as_fulfilled() {
        let (lab, handle) = lab();
        let promise = all::<i32, &str, _>(
            &handle,
            vec![
                Resolution::Value(1),
                Resolution::Value(2),
                Resolution::Value(3),
            ],
        );
        lab.run_until_idle();
        assert_eq!(promise.try_value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn first_rejection_wins() {
        let (lab, handle) = lab();
        let failing = Promise::<i32, &str>::reject(&handle, Rejection::Error("boom"));
        let promise = all(
            &handle,
            vec![Resolution::Value(1), Resolution::Promise(failing)],
        );
        lab.run_until_idle();
        assert_eq!(promise.try_rejection(), Some(Rejection::Error("boom")));
    }
}
