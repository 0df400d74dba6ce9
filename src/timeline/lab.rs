//! Deterministic virtual-time timeline for tests.
//!
//! Time is a tick counter that only advances when the caller says so, which
//! makes every schedule deterministic:
//!
//! - same drains and advances → same execution order
//! - timers expire in `(deadline, registration order)`
//! - no wall-clock dependencies
//!
//! # Example
//!
//! ```ignore
//! let lab = Arc::new(LabTimeline::new());
//! let handle: TimelineHandle = lab.clone();
//!
//! let (settler, promise) = Promise::<i32, &str>::deferred(&handle);
//! lab.schedule_after(10, Box::new(move || settler.resolve(Resolution::Value(5))));
//!
//! lab.advance(10);        // timer fires, settlement queued
//! lab.run_until_idle();   // observers run
//! ```

use super::{Job, Schedule};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use tracing::trace;

/// A timer entry in the virtual wheel.
struct LabTimer {
    /// Deadline in virtual ticks.
    deadline: u64,
    /// Registration counter, for deterministic ordering of equal deadlines.
    timer_id: u64,
    /// Job to enqueue when the timer expires.
    job: Job,
}

impl Eq for LabTimer {}

impl PartialEq for LabTimer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.timer_id == other.timer_id
    }
}

impl Ord for LabTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap ordering: earliest deadline first, then lowest timer_id
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.timer_id.cmp(&self.timer_id))
    }
}

impl PartialOrd for LabTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct LabState {
    queue: VecDeque<Job>,
    timers: BinaryHeap<LabTimer>,
    now: u64,
    next_timer_id: u64,
}

/// Deterministic virtual-time timeline.
///
/// Jobs accumulate in a FIFO queue and run only inside
/// [`run_until_idle`](Self::run_until_idle); timers accumulate in a wheel
/// and move onto the queue only inside [`advance`](Self::advance).
pub struct LabTimeline {
    state: Mutex<LabState>,
}

impl LabTimeline {
    /// Creates a timeline at tick zero with nothing scheduled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LabState {
                queue: VecDeque::new(),
                timers: BinaryHeap::new(),
                now: 0,
                next_timer_id: 0,
            }),
        }
    }

    /// Returns the current virtual time in ticks.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.state.lock().expect("lab timeline lock poisoned").now
    }

    /// Registers a timer that enqueues `job` once `delay` ticks have been
    /// advanced past.
    pub fn schedule_after(&self, delay: u64, job: Job) {
        let mut state = self.state.lock().expect("lab timeline lock poisoned");
        let deadline = state.now + delay;
        let timer_id = state.next_timer_id;
        state.next_timer_id += 1;
        trace!(deadline, timer_id, "lab timer registered");
        state.timers.push(LabTimer {
            deadline,
            timer_id,
            job,
        });
    }

    /// Advances virtual time by `ticks`, moving every expired timer's job
    /// onto the run queue in `(deadline, registration)` order.
    ///
    /// Returns the number of timers fired. Jobs do not run here; drain them
    /// with [`run_until_idle`](Self::run_until_idle).
    pub fn advance(&self, ticks: u64) -> usize {
        let mut state = self.state.lock().expect("lab timeline lock poisoned");
        state.now += ticks;
        let mut fired = 0;
        while state
            .timers
            .peek()
            .is_some_and(|timer| timer.deadline <= state.now)
        {
            let timer = state.timers.pop().expect("peeked timer missing");
            state.queue.push_back(timer.job);
            fired += 1;
        }
        trace!(now = state.now, fired, "virtual time advanced");
        fired
    }

    /// Runs queued jobs in FIFO order until the queue is empty, including
    /// jobs that running jobs enqueue. Returns the number of jobs run.
    ///
    /// The lock is released around each job, so jobs may schedule further
    /// work or settle promises freely.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = {
                let mut state = self.state.lock().expect("lab timeline lock poisoned");
                state.queue.pop_front()
            };
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => break,
            }
        }
        trace!(ran, "lab timeline drained");
        ran
    }

    /// Convenience: [`advance`](Self::advance) then
    /// [`run_until_idle`](Self::run_until_idle). Returns the number of jobs
    /// run.
    pub fn advance_and_run(&self, ticks: u64) -> usize {
        self.advance(ticks);
        self.run_until_idle()
    }

    /// Returns the number of jobs waiting on the run queue.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.state
            .lock()
            .expect("lab timeline lock poisoned")
            .queue
            .len()
    }

    /// Returns the number of timers that have not yet expired.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.state
            .lock()
            .expect("lab timeline lock poisoned")
            .timers
            .len()
    }
}

impl Default for LabTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule for LabTimeline {
    fn schedule_later(&self, job: Job) {
        let mut state = self.state.lock().expect("lab timeline lock poisoned");
        state.queue.push_back(job);
    }
}

impl fmt::Debug for LabTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().expect("lab timeline lock poisoned");
        f.debug_struct("LabTimeline")
            .field("now", &state.now)
            .field("pending_jobs", &state.queue.len())
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Job) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let make = move |tag: u32| -> Job {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().expect("recorder lock poisoned").push(tag))
        };
        (seen, make)
    }

    #[test]
    fn jobs_drain_fifo() {
        let lab = LabTimeline::new();
        let (seen, job) = recorder();

        lab.schedule_later(job(1));
        lab.schedule_later(job(2));
        lab.schedule_later(job(3));
        assert_eq!(lab.pending_jobs(), 3);

        assert_eq!(lab.run_until_idle(), 3);
        assert_eq!(*seen.lock().expect("recorder lock poisoned"), vec![1, 2, 3]);
    }

    #[test]
    fn jobs_scheduled_while_draining_run_in_same_drain() {
        let lab = Arc::new(LabTimeline::new());
        let (seen, job) = recorder();

        let inner = job(2);
        let lab_inner = Arc::clone(&lab);
        let sink = Arc::clone(&seen);
        lab.schedule_later(Box::new(move || {
            sink.lock().expect("recorder lock poisoned").push(1);
            lab_inner.schedule_later(inner);
        }));

        assert_eq!(lab.run_until_idle(), 2);
        assert_eq!(*seen.lock().expect("recorder lock poisoned"), vec![1, 2]);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let lab = LabTimeline::new();
        let (seen, job) = recorder();

        lab.schedule_after(100, job(1));
        lab.schedule_after(50, job(2));
        assert_eq!(lab.pending_timers(), 2);

        assert_eq!(lab.advance(60), 1);
        lab.run_until_idle();
        assert_eq!(*seen.lock().expect("recorder lock poisoned"), vec![2]);

        assert_eq!(lab.advance(60), 1);
        lab.run_until_idle();
        assert_eq!(*seen.lock().expect("recorder lock poisoned"), vec![2, 1]);
        assert_eq!(lab.now(), 120);
    }

    #[test]
    fn equal_deadlines_fire_in_registration_order() {
        let lab = LabTimeline::new();
        let (seen, job) = recorder();

        lab.schedule_after(10, job(1));
        lab.schedule_after(10, job(2));
        lab.schedule_after(10, job(3));

        assert_eq!(lab.advance_and_run(10), 3);
        assert_eq!(*seen.lock().expect("recorder lock poisoned"), vec![1, 2, 3]);
    }

    #[test]
    fn advance_without_reaching_deadline_fires_nothing() {
        let lab = LabTimeline::new();
        let (seen, job) = recorder();

        lab.schedule_after(100, job(1));
        assert_eq!(lab.advance_and_run(99), 0);
        assert!(seen.lock().expect("recorder lock poisoned").is_empty());
        assert_eq!(lab.pending_timers(), 1);
    }

    #[test]
    fn debug_reports_counters() {
        let lab = LabTimeline::new();
        lab.schedule_later(Box::new(|| {}));
        let rendered = format!("{lab:?}");
        assert!(rendered.contains("pending_jobs: 1"));
    }
}
