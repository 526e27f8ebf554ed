use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::router::DependencySource;
use crate::scheduler::SchedulerInner;
use crate::tracker::Tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(pub u64);

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a [`Computation`].
///
/// ```text
/// PendingFirstRun --flush--> Clean --source fired--> Dirty --flush--> Clean
///        \______________________\_______________________\__stop()__> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationState {
    PendingFirstRun,
    Clean,
    Dirty,
    Stopped,
}

type Body = Box<dyn FnMut(&Tracker)>;
type InvalidateListener = Box<dyn FnOnce(&Computation)>;

struct ComputationInner {
    id: ComputationId,
    state: Cell<ComputationState>,
    /// `None` while the body is executing or after `stop()`.
    body: RefCell<Option<Body>>,
    dependencies: RefCell<Vec<Weak<dyn DependencySource>>>,
    invalidate_listeners: RefCell<Vec<InvalidateListener>>,
    scheduler: Weak<SchedulerInner>,
    run_count: Cell<u64>,
}

/// A unit of work re-executed whenever a source it read during its last run
/// fires.
///
/// Cloning yields another handle to the same computation. Routers hold strong
/// handles to their dependents, so a computation stays alive while anything
/// it reads can still invalidate it; call [`stop`](Self::stop) to release it.
#[derive(Clone)]
pub struct Computation {
    inner: Rc<ComputationInner>,
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("dependencies", &self.inner.dependencies.borrow().len())
            .field("runs", &self.inner.run_count.get())
            .finish()
    }
}

impl PartialEq for Computation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Computation {}

impl Computation {
    /// Creates the computation in `PendingFirstRun` and queues it.
    pub(crate) fn new(scheduler: &Rc<SchedulerInner>, id: ComputationId, body: Body) -> Self {
        let computation = Self {
            inner: Rc::new(ComputationInner {
                id,
                state: Cell::new(ComputationState::PendingFirstRun),
                body: RefCell::new(Some(body)),
                dependencies: RefCell::new(Vec::new()),
                invalidate_listeners: RefCell::new(Vec::new()),
                scheduler: Rc::downgrade(scheduler),
                run_count: Cell::new(0),
            }),
        };
        scheduler.enqueue(computation.clone());
        computation
    }

    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    pub fn state(&self) -> ComputationState {
        self.inner.state.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ComputationState::Stopped
    }

    /// True while waiting for a run (first run or after invalidation).
    pub fn is_dirty(&self) -> bool {
        matches!(
            self.state(),
            ComputationState::PendingFirstRun | ComputationState::Dirty
        )
    }

    /// Number of times the body has been executed.
    pub fn run_count(&self) -> u64 {
        self.inner.run_count.get()
    }

    /// Number of routers this computation is currently registered with.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .dependencies
            .borrow()
            .iter()
            .filter(|d| d.strong_count() > 0)
            .count()
    }

    /// Registers a listener for the next transition to dirty, or for
    /// `stop()`, whichever comes first. On an already stopped computation the
    /// listener runs immediately.
    pub fn on_next_invalidate(&self, listener: impl FnOnce(&Computation) + 'static) {
        if self.is_stopped() {
            listener(self);
            return;
        }
        self.inner
            .invalidate_listeners
            .borrow_mut()
            .push(Box::new(listener));
    }

    /// Marks the computation dirty and queues it for the next flush.
    ///
    /// Only a `Clean` computation changes state; pending, dirty and stopped
    /// ones are already where invalidation would put them.
    pub fn invalidate(&self) {
        if self.state() != ComputationState::Clean {
            return;
        }
        self.inner.state.set(ComputationState::Dirty);
        if let Some(scheduler) = self.inner.scheduler.upgrade() {
            scheduler.enqueue(self.clone());
        }
        self.fire_invalidate_listeners();
    }

    /// Permanently detaches the computation from every source.
    ///
    /// Pending invalidate listeners fire exactly once. A stopped computation
    /// never runs again, even if it was already queued.
    pub fn stop(&self) {
        if self.is_stopped() {
            return;
        }
        self.inner.state.set(ComputationState::Stopped);
        self.clear_dependencies();
        self.fire_invalidate_listeners();
        drop(self.inner.body.borrow_mut().take());
        debug!(computation = %self.inner.id, runs = self.run_count(), "computation stopped");
    }

    pub(crate) fn add_dependency(&self, source: Weak<dyn DependencySource>) {
        self.inner.dependencies.borrow_mut().push(source);
    }

    /// Runs the body if the computation is waiting for a run. Returns whether
    /// the body was executed.
    pub(crate) fn recompute(&self) -> bool {
        if !self.is_dirty() {
            return false;
        }
        self.clear_dependencies();
        self.inner.state.set(ComputationState::Clean);

        let Some(body) = self.inner.body.borrow_mut().take() else {
            return false;
        };
        self.inner.run_count.set(self.inner.run_count.get() + 1);

        let mut guard = BodyGuard {
            computation: self,
            body: Some(body),
        };
        let tracker = Tracker::for_computation(self);
        if let Some(body) = guard.body.as_mut() {
            body(&tracker);
        }
        true
    }

    fn clear_dependencies(&self) {
        let dependencies = std::mem::take(&mut *self.inner.dependencies.borrow_mut());
        for dependency in dependencies {
            if let Some(source) = dependency.upgrade() {
                source.remove_dependent(self.inner.id);
            }
        }
    }

    fn fire_invalidate_listeners(&self) {
        let listeners = std::mem::take(&mut *self.inner.invalidate_listeners.borrow_mut());
        for listener in listeners {
            listener(self);
        }
    }
}

/// Puts the body back after a run, including when the body unwinds. A body
/// that panicked is left dirty so the next flush retries it.
struct BodyGuard<'a> {
    computation: &'a Computation,
    body: Option<Body>,
}

impl Drop for BodyGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.computation.inner;
        if inner.state.get() == ComputationState::Stopped {
            return;
        }
        if let Some(body) = self.body.take() {
            *inner.body.borrow_mut() = Some(body);
        }
        if std::thread::panicking() && inner.state.get() == ComputationState::Clean {
            inner.state.set(ComputationState::Dirty);
            if let Some(scheduler) = inner.scheduler.upgrade() {
                scheduler.enqueue(self.computation.clone());
            }
        }
    }
}
