//! All-settled combinator: wait everything out, never reject.

use crate::adopt::Resolution;
use crate::outcome::SettledOutcome;
use crate::promise::{Promise, Settler};
use crate::timeline::TimelineHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fulfills once every input has settled, with one status-tagged
/// [`SettledOutcome`] per input, in input order regardless of completion
/// order. Never rejects.
///
/// Empty input fulfills immediately with an empty vector.
pub fn all_settled<T, E, I>(
    timeline: &TimelineHandle,
    inputs: I,
) -> Promise<Vec<SettledOutcome<T, E>>, E>
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
    let slots: Arc<Mutex<Vec<Option<SettledOutcome<T, E>>>>> =
        Arc::new(Mutex::new((0..inputs.len()).map(|_| None).collect()));

    for (index, input) in inputs.into_iter().enumerate() {
        let on_value = settler.clone();
        let on_reason = settler.clone();
        let remaining_value = Arc::clone(&remaining);
        let remaining_reason = Arc::clone(&remaining);
        let slots_value = Arc::clone(&slots);
        let slots_reason = Arc::clone(&slots);
        Promise::resolve(timeline, input).then_catch(
            move |value| {
                record(
                    &slots_value,
                    &remaining_value,
                    &on_value,
                    index,
                    SettledOutcome::fulfilled(value),
                );
                Ok(Resolution::Value(()))
            },
            move |reason| {
                record(
                    &slots_reason,
                    &remaining_reason,
                    &on_reason,
                    index,
                    SettledOutcome::rejected(reason),
                );
                Ok(Resolution::Value(()))
            },
        );
    }

    promise
}

fn record<T, E>(
    slots: &Mutex<Vec<Option<SettledOutcome<T, E>>>>,
    remaining: &AtomicUsize,
    settler: &Settler<Vec<SettledOutcome<T, E>>, E>,
    index: usize,
    outcome: SettledOutcome<T, E>,
) where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    slots.lock().expect("all_settled slots lock poisoned")[index] = Some(outcome);
    if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
        let outcomes: Vec<SettledOutcome<T, E>> = slots
            .lock()
            .expect("all_settled slots lock poisoned")
            .iter_mut()
            .map(|slot| slot.take().expect("every input settled before aggregation"))
            .collect();
        settler.resolve(Resolution::Value(outcomes));
    }
}
