//! Race combinator: first settlement wins.

use crate::adopt::Resolution;
use crate::promise::Promise;
use crate::timeline::TimelineHandle;

/// Settles — fulfilled or rejected — with the outcome of whichever input
/// settles first, in settlement order on the timeline's clock. Later
/// settlements are ignored.
///
/// Empty input never settles: the returned promise stays pending forever.
pub fn race<T, E, I>(timeline: &TimelineHandle, inputs: I) -> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    I: IntoIterator<Item = Resolution<T, E>>,
{
    let (settler, promise) = Promise::deferred(timeline);

    for input in inputs {
        let on_value = settler.clone();
        let on_reason = settler.clone();
        Promise::resolve(timeline, input).then_catch(
            move |value| {
                on_value.resolve(Resolution::Value(value));
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
