//! Update Scheduler
//!
//! A [`JobQueue`] is a ready-made pluggable scheduler. Subscribers created
//! with its scheduler are queued instead of re-run inline when a dependency
//! changes, and run on the next [`JobQueue::flush`].
//!
//! # Algorithm
//!
//! 1. A trigger hands the subscriber to the queue. A subscriber already
//!    pending is not queued twice, so any number of triggers between two
//!    flushes collapse into one run.
//! 2. A flush drains the pending set in subscriber creation order, which
//!    runs outer subscribers before the inner ones they created.
//! 3. Jobs queued while flushing are drained by the same flush. A job that
//!    keeps re-queueing itself is dropped once it exceeds the recursion
//!    limit.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::error::{warn, ReactiveError};
use crate::reactive::{Scheduler, Subscriber, SubscriberId};

/// Batches and dedupes subscriber re-runs until flushed.
#[derive(Clone)]
pub struct JobQueue {
    inner: Rc<QueueInner>,
}

struct QueueInner {
    pending: RefCell<Vec<Subscriber>>,
    queued: RefCell<HashSet<SubscriberId>>,
    flushing: Cell<bool>,
    recursion_limit: usize,
}

impl JobQueue {
    /// Runs of the same job allowed within a single flush.
    pub const DEFAULT_RECURSION_LIMIT: usize = 100;

    pub fn new() -> Self {
        Self::with_recursion_limit(Self::DEFAULT_RECURSION_LIMIT)
    }

    pub fn with_recursion_limit(recursion_limit: usize) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                pending: RefCell::new(Vec::new()),
                queued: RefCell::new(HashSet::new()),
                flushing: Cell::new(false),
                recursion_limit,
            }),
        }
    }

    /// A scheduler that queues the triggered subscriber on this queue.
    ///
    /// The scheduler holds the queue weakly; once every `JobQueue` handle is
    /// dropped, triggers become no-ops.
    pub fn scheduler(&self) -> Scheduler {
        let queue: Weak<QueueInner> = Rc::downgrade(&self.inner);
        Rc::new(move |subscriber: &Subscriber| {
            if let Some(inner) = queue.upgrade() {
                JobQueue { inner }.queue(subscriber);
            }
        })
    }

    /// Queue a subscriber for the next flush. Returns `false` if it was
    /// already pending.
    pub fn queue(&self, subscriber: &Subscriber) -> bool {
        if !self.inner.queued.borrow_mut().insert(subscriber.id()) {
            return false;
        }
        self.inner.pending.borrow_mut().push(subscriber.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.borrow().is_empty()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Run every pending job. Returns how many jobs ran.
    ///
    /// A flush requested from inside a running job is ignored; the outer
    /// flush picks up whatever that job queued.
    pub fn flush(&self) -> usize {
        if self.inner.flushing.replace(true) {
            return 0;
        }
        let _guard = FlushGuard(&self.inner);

        let limit = self.inner.recursion_limit;
        let mut counts: HashMap<SubscriberId, usize> = HashMap::new();
        let mut ran = 0;

        loop {
            let mut batch = self.inner.pending.take();
            if batch.is_empty() {
                break;
            }
            batch.sort_by_key(|job| job.id());

            for job in batch {
                self.inner.queued.borrow_mut().remove(&job.id());

                let count = counts.entry(job.id()).or_insert(0);
                *count += 1;
                if *count > limit {
                    warn(ReactiveError::RecursionLimit { limit });
                    continue;
                }

                if job.is_active() {
                    job.run();
                    ran += 1;
                }
            }
        }

        debug!(jobs = ran, "flushed job queue");
        ran
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.len())
            .field("flushing", &self.is_flushing())
            .field("recursion_limit", &self.inner.recursion_limit)
            .finish()
    }
}

struct FlushGuard<'a>(&'a QueueInner);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.flushing.set(false);
    }
}
