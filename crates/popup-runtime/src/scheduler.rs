#![forbid(unsafe_code)]

//! Single-context execution queue with a virtual clock.
//!
//! Every registry write, stream delivery and transition callback runs on the
//! context that owns the [`Scheduler`]. Transitions never block: they
//! schedule a completion job at `now + duration` and return. Time only moves
//! when the owner calls [`Scheduler::advance`], which makes tests fully
//! deterministic.
//!
//! # Invariants
//!
//! 1. Jobs fire in deadline order; ties fire in scheduling order.
//! 2. While a job runs, [`Scheduler::now`] equals that job's deadline.
//! 3. A job scheduled by a running job fires in the same `advance` call if
//!    its deadline falls inside the advanced window.
//! 4. The clock never moves backwards.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{trace, warn};

type Job = Box<dyn FnOnce()>;

/// Handle for cancelling a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId {
    deadline: Duration,
    seq: u64,
}

impl TimerId {
    /// Virtual time at which the job fires.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

struct SchedulerInner {
    now: Duration,
    next_seq: u64,
    timers: BTreeMap<(Duration, u64), Job>,
}

/// Shared handle to the execution context's job queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.timers.len())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                now: Duration::ZERO,
                next_seq: 0,
                timers: BTreeMap::new(),
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Queue a job to run on the next `advance` or `run_pending`.
    pub fn dispatch(&self, job: impl FnOnce() + 'static) -> TimerId {
        self.schedule_after(Duration::ZERO, job)
    }

    /// Queue a job to run once `delay` of virtual time has passed.
    pub fn schedule_after(&self, delay: Duration, job: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let deadline = inner.now.saturating_add(delay);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.timers.insert((deadline, seq), Box::new(job));
        trace!(deadline_us = deadline.as_micros() as u64, seq, "job scheduled");
        TimerId { deadline, seq }
    }

    /// Remove a job that has not fired yet. Returns `false` if it already
    /// fired or was cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.inner
            .borrow_mut()
            .timers
            .remove(&(id.deadline, id.seq))
            .is_some()
    }

    /// Number of jobs waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.borrow().timers.is_empty()
    }

    /// Deadline of the earliest pending job.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .borrow()
            .timers
            .first_key_value()
            .map(|(key, _)| key.0)
    }

    /// Move the clock forward by `delta`, firing every job that comes due.
    ///
    /// Returns the number of jobs fired.
    pub fn advance(&self, delta: Duration) -> usize {
        let target = self.now().saturating_add(delta);
        let mut fired = 0;
        while let Some(job) = self.pop_due(target) {
            job();
            fired += 1;
        }
        let mut inner = self.inner.borrow_mut();
        if inner.now < target {
            inner.now = target;
        }
        fired
    }

    /// Fire jobs that are already due without moving the clock.
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Jump from deadline to deadline until the queue is empty or
    /// `max_jobs` jobs have fired.
    pub fn run_until_idle(&self, max_jobs: usize) -> usize {
        let mut fired = 0;
        while fired < max_jobs {
            let Some(job) = self.pop_due(Duration::MAX) else {
                return fired;
            };
            job();
            fired += 1;
        }
        if !self.is_idle() {
            warn!(
                max_jobs,
                pending = self.pending(),
                "scheduler still busy after job limit"
            );
        }
        fired
    }

    /// Pop the earliest job due at or before `limit`, moving the clock to
    /// its deadline. The borrow is released before the job runs.
    fn pop_due(&self, limit: Duration) -> Option<Job> {
        let mut inner = self.inner.borrow_mut();
        let key = inner.timers.first_key_value().map(|(key, _)| *key)?;
        if key.0 > limit {
            return None;
        }
        let job = inner.timers.remove(&key)?;
        if inner.now < key.0 {
            inner.now = key.0;
        }
        Some(job)
    }
}
