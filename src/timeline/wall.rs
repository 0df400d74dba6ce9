//! Wall-clock timeline backed by a dedicated timer thread.
//!
//! The worker thread owns a min-heap of timer entries ordered by
//! `(deadline, registration)` and sleeps on a condvar until the earliest
//! deadline (or a new registration) wakes it. `schedule_later` is a
//! zero-delay timer; [`schedule_after`](WallTimeline::schedule_after) is the
//! `setTimeout` analogue for time-bounded scenarios such as racing a
//! promise against a timer.
//!
//! Dropping the timeline shuts the worker down; timers that have not fired
//! are abandoned, so a promise waiting on one simply never settles.

use super::{Job, Schedule};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

struct WallTimer {
    deadline: Instant,
    seq: u64,
    job: Job,
}

impl Eq for WallTimer {}

impl PartialEq for WallTimer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for WallTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap ordering: earliest deadline first, then lowest seq
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for WallTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct WallState {
    timers: BinaryHeap<WallTimer>,
    next_seq: u64,
    shutdown: bool,
}

struct WallShared {
    state: Mutex<WallState>,
    cond: Condvar,
}

/// Wall-clock timeline running jobs on a dedicated worker thread.
pub struct WallTimeline {
    shared: Arc<WallShared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl WallTimeline {
    /// Creates the timeline and spawns its worker thread.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(WallShared {
            state: Mutex::new(WallState {
                timers: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            cond: Condvar::new(),
        });
        let for_worker = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("promissory-timeline".to_string())
            .spawn(move || worker_loop(&for_worker))
            .expect("failed to spawn timeline worker");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Registers `job` to run once `delay` has elapsed.
    ///
    /// Jobs with equal deadlines run in registration order.
    pub fn schedule_after(&self, delay: Duration, job: Job) {
        {
            let mut state = self.shared.state.lock().expect("wall timeline lock poisoned");
            let seq = state.next_seq;
            state.next_seq += 1;
            trace!(seq, ?delay, "wall timer registered");
            state.timers.push(WallTimer {
                deadline: Instant::now() + delay,
                seq,
                job,
            });
        }
        self.shared.cond.notify_one();
    }
}

impl Default for WallTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule for WallTimeline {
    fn schedule_later(&self, job: Job) {
        self.schedule_after(Duration::ZERO, job);
    }
}

impl Drop for WallTimeline {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("wall timeline lock poisoned");
            state.shutdown = true;
        }
        self.shared.cond.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!("wall timeline shut down");
    }
}

impl fmt::Debug for WallTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock().expect("wall timeline lock poisoned");
        f.debug_struct("WallTimeline")
            .field("pending_timers", &state.timers.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

fn worker_loop(shared: &WallShared) {
    debug!("wall timeline worker started");
    loop {
        let job = {
            let mut state = shared.state.lock().expect("wall timeline lock poisoned");
            loop {
                if state.shutdown {
                    return;
                }
                let next_deadline = state.timers.peek().map(|timer| timer.deadline);
                match next_deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if deadline <= now {
                            break state.timers.pop().expect("peeked timer missing").job;
                        }
                        let (guard, _timed_out) = shared
                            .cond
                            .wait_timeout(state, deadline - now)
                            .expect("wall timeline lock poisoned");
                        state = guard;
                    }
                    None => {
                        state = shared
                            .cond
                            .wait(state)
                            .expect("wall timeline lock poisoned");
                    }
                }
            }
        };
        // A panicking job must not take down the worker thread.
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("scheduled job panicked; timeline worker continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn schedule_later_runs_job() {
        let timeline = WallTimeline::new();
        let (tx, rx) = mpsc::channel();

        timeline.schedule_later(Box::new(move || {
            tx.send(42).expect("receiver alive");
        }));

        let value = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("job should run");
        assert_eq!(value, 42);
    }

    #[test]
    fn delayed_jobs_run_in_deadline_order() {
        let timeline = WallTimeline::new();
        let (tx, rx) = mpsc::channel();

        let late = tx.clone();
        timeline.schedule_after(
            Duration::from_millis(50),
            Box::new(move || late.send("late").expect("receiver alive")),
        );
        timeline.schedule_after(
            Duration::from_millis(5),
            Box::new(move || tx.send("early").expect("receiver alive")),
        );

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).expect("first job"),
            "early"
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).expect("second job"),
            "late"
        );
    }

    #[test]
    fn panicking_job_does_not_kill_worker() {
        let timeline = WallTimeline::new();
        let (tx, rx) = mpsc::channel();

        timeline.schedule_later(Box::new(|| panic!("scheduled job failure")));
        timeline.schedule_after(
            Duration::from_millis(5),
            Box::new(move || tx.send(()).expect("receiver alive")),
        );

        rx.recv_timeout(Duration::from_secs(5))
            .expect("worker should survive the panic");
    }

    #[test]
    fn drop_joins_worker() {
        let timeline = WallTimeline::new();
        drop(timeline);
        // Nothing to assert: the test passes if drop does not hang.
    }
}
