//! Task scheduling seam.
//!
//! Every orchestrator in this crate runs on one logical timeline: vendor
//! callbacks, timeouts and retry delays are all funnelled through a
//! [`Scheduler`]. In production that is a tokio runtime handle (a
//! current-thread runtime keeps the timeline single-threaded); in tests it is
//! a [`ManualScheduler`] driven by a [`MockClock`](crate::clock::MockClock).

use crate::AdwardenError;
use std::time::Duration;
use tokio::runtime::Handle;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Posts work onto the orchestration timeline.
pub trait Scheduler: Send + Sync {
    /// Run `task` after `delay` has elapsed.
    fn post_delayed(&self, delay: Duration, task: Task);

    /// Run `task` as soon as possible, never inline.
    fn post(&self, task: Task) {
        self.post_delayed(Duration::ZERO, task);
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Wrap an explicit runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is currently running on.
    ///
    /// # Errors
    /// Returns `Runtime` when called outside a tokio runtime.
    pub fn current() -> Result<Self, AdwardenError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| AdwardenError::Runtime(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn post_delayed(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task();
        });
    }
}

#[cfg(any(test, feature = "test-seams"))]
pub use manual::ManualScheduler;

#[cfg(any(test, feature = "test-seams"))]
mod manual {
    use super::{Scheduler, Task};
    use crate::clock::{Clock, MockClock};
    use chrono::{DateTime, Utc};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Pending {
        due: DateTime<Utc>,
        seq: u64,
        task: Task,
    }

    #[derive(Default)]
    struct Queue {
        next_seq: u64,
        tasks: Vec<Pending>,
    }

    /// Deterministic scheduler for tests.
    ///
    /// Tasks only run when the test calls [`run_pending`](Self::run_pending)
    /// or [`advance`](Self::advance). Due order is (due time, post order).
    pub struct ManualScheduler {
        clock: Arc<MockClock>,
        queue: Mutex<Queue>,
    }

    impl ManualScheduler {
        /// Create a scheduler that reads and advances `clock`.
        pub fn new(clock: Arc<MockClock>) -> Self {
            Self {
                clock,
                queue: Mutex::new(Queue::default()),
            }
        }

        /// Number of tasks not yet run.
        pub fn pending(&self) -> usize {
            self.queue.lock().expect("scheduler poisoned").tasks.len()
        }

        /// Run every task that is due now, including tasks they post.
        pub fn run_pending(&self) -> usize {
            let now = self.clock.now_utc();
            let mut ran = 0;
            while let Some((_, task)) = self.pop_due(now) {
                task();
                ran += 1;
            }
            ran
        }

        /// Advance the clock by `by`, running tasks in due order as their
        /// time is reached.
        pub fn advance(&self, by: Duration) -> usize {
            let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
            let target = self.clock.now_utc() + step;
            let mut ran = 0;
            while let Some((due, task)) = self.pop_due(target) {
                if due > self.clock.now_utc() {
                    self.clock.set(due);
                }
                task();
                ran += 1;
            }
            self.clock.set(target);
            ran
        }

        fn pop_due(&self, limit: DateTime<Utc>) -> Option<(DateTime<Utc>, Task)> {
            let mut queue = self.queue.lock().expect("scheduler poisoned");
            let index = queue
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, p)| p.due <= limit)
                .min_by_key(|(_, p)| (p.due, p.seq))
                .map(|(i, _)| i)?;
            let pending = queue.tasks.remove(index);
            Some((pending.due, pending.task))
        }
    }

    impl Scheduler for ManualScheduler {
        fn post_delayed(&self, delay: Duration, task: Task) {
            let step =
                chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            let due = self.clock.now_utc() + step;
            let mut queue = self.queue.lock().expect("scheduler poisoned");
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.tasks.push(Pending { due, seq, task });
        }
    }
}
