use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::computation::{Computation, ComputationId};
use crate::config::ReactiveConfig;
use crate::error::ReactiveError;
use crate::tracker::{run_with_computation, Tracker};

pub(crate) struct SchedulerInner {
    config: ReactiveConfig,
    queue: RefCell<VecDeque<Computation>>,
    flushing: Cell<bool>,
    post_flush: RefCell<Vec<Box<dyn FnOnce()>>>,
    next_id: Cell<u64>,
}

impl SchedulerInner {
    pub(crate) fn enqueue(&self, computation: Computation) {
        self.queue.borrow_mut().push_back(computation);
    }
}

/// Outcome of one [`Reactive::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Rounds needed until no computation was dirty.
    pub rounds: usize,
    /// Computation bodies executed.
    pub runs: usize,
}

/// Coordinator that batches invalidations and runs dirty computations.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<SchedulerInner>,
}

impl Default for Reactive {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("queued", &self.inner.queue.borrow().len())
            .field("flushing", &self.inner.flushing.get())
            .finish()
    }
}

impl Reactive {
    pub fn new() -> Self {
        Self::with_config(ReactiveConfig::default())
    }

    pub fn with_config(config: ReactiveConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                config,
                queue: RefCell::new(VecDeque::new()),
                flushing: Cell::new(false),
                post_flush: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn config(&self) -> &ReactiveConfig {
        &self.inner.config
    }

    /// Creates a computation and schedules its first run. `body` does not
    /// run until the next [`flush`](Self::flush).
    pub fn run_when_dependencies_change(
        &self,
        body: impl FnMut(&Tracker) + 'static,
    ) -> Computation {
        let id = ComputationId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        Computation::new(&self.inner, id, Box::new(body))
    }

    /// See [`run_with_computation`].
    pub fn run_with_computation<R>(
        computation: Option<&Computation>,
        body: impl FnOnce(&Tracker) -> R,
    ) -> R {
        run_with_computation(computation, body)
    }

    /// Queues `listener` to run once after the next flush settles.
    pub fn add_post_flush_listener(&self, listener: impl FnOnce() + 'static) {
        self.inner.post_flush.borrow_mut().push(Box::new(listener));
    }

    /// True if any live computation waits for a run.
    pub fn has_pending(&self) -> bool {
        self.inner.queue.borrow().iter().any(Computation::is_dirty)
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    /// Runs every pending or dirty computation, round after round, until none
    /// is dirty.
    ///
    /// A round covers the computations queued when it starts; anything dirtied
    /// while the round runs (including by its own body) is picked up by the
    /// following round. A nested call from inside a body returns immediately
    /// with empty stats.
    ///
    /// A panicking body unwinds out of `flush()`. That computation is left
    /// dirty, the rest of the queue is kept, and the next `flush()` carries on.
    pub fn flush(&self) -> Result<FlushStats, ReactiveError> {
        if self.inner.flushing.get() {
            trace!("nested flush ignored");
            return Ok(FlushStats::default());
        }
        self.inner.flushing.set(true);
        let _flushing = FlushingFlag(&self.inner);

        let mut stats = FlushStats::default();
        loop {
            self.inner.queue.borrow_mut().retain(Computation::is_dirty);
            let round_len = self.inner.queue.borrow().len();
            if round_len == 0 {
                break;
            }
            if stats.rounds >= self.inner.config.max_flush_rounds {
                let pending = round_len;
                warn!(rounds = stats.rounds, pending, "flush did not settle");
                return Err(ReactiveError::FlushLimitExceeded {
                    rounds: stats.rounds,
                    pending,
                });
            }
            stats.rounds += 1;
            for _ in 0..round_len {
                let next = self.inner.queue.borrow_mut().pop_front();
                let Some(computation) = next else {
                    break;
                };
                if computation.recompute() {
                    stats.runs += 1;
                }
            }
        }

        let post_flush = std::mem::take(&mut *self.inner.post_flush.borrow_mut());
        for listener in post_flush {
            listener();
        }

        if stats.runs > 0 {
            debug!(rounds = stats.rounds, runs = stats.runs, "flush settled");
        }
        Ok(stats)
    }
}

struct FlushingFlag<'a>(&'a SchedulerInner);

impl Drop for FlushingFlag<'_> {
    fn drop(&mut self) {
        self.0.flushing.set(false);
    }
}
