//! Change event routers.
//!
//! A router stands for one reactive source. It keeps three sets:
//!
//! | Set          | Added by                      | Cleared                    |
//! |--------------|-------------------------------|----------------------------|
//! | dependents   | `register_read` in a tracker  | on every `fire`            |
//! | one-shot     | `on_next_fire`                | on every `fire`            |
//! | listeners    | `add_listener`                | via [`Registration`]       |
//!
//! Firing takes the dependent and one-shot sets out of the router before
//! anything is delivered, so callbacks that re-register land in the next
//! round.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::computation::{Computation, ComputationId};
use crate::registration::Registration;
use crate::tracker::Tracker;

pub type RouterId = u64;

static NEXT_ROUTER_ID: AtomicU64 = AtomicU64::new(1);

/// Router side of a dependency edge, seen from the computation that has to
/// unregister itself.
pub(crate) trait DependencySource {
    fn remove_dependent(&self, computation: ComputationId);
}

type Listener<E> = Rc<dyn Fn(&E)>;

struct RouterInner<E> {
    id: RouterId,
    dependents: RefCell<Vec<Computation>>,
    one_shot: RefCell<Vec<Box<dyn FnOnce(&E)>>>,
    listeners: RefCell<Vec<(Rc<Cell<bool>>, Listener<E>)>>,
}

impl<E: 'static> DependencySource for RouterInner<E> {
    fn remove_dependent(&self, computation: ComputationId) {
        self.dependents
            .borrow_mut()
            .retain(|c| c.id() != computation);
    }
}

/// Reactive source that routes change events of type `E`.
///
/// Cloning yields another handle to the same router.
pub struct EventRouter<E: 'static> {
    inner: Rc<RouterInner<E>>,
}

impl<E: 'static> Clone for EventRouter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for EventRouter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for EventRouter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("id", &self.inner.id)
            .field("dependents", &self.inner.dependents.borrow().len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: 'static> EventRouter<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RouterInner {
                id: NEXT_ROUTER_ID.fetch_add(1, Ordering::Relaxed),
                dependents: RefCell::new(Vec::new()),
                one_shot: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> RouterId {
        self.inner.id
    }

    /// Records a read of this source by the tracker's computation.
    ///
    /// No-op for untracked readers and stopped computations. Reading the same
    /// router several times in one run registers once.
    pub fn register_read(&self, tracker: &Tracker) {
        let Some(computation) = tracker.computation() else {
            return;
        };
        if computation.is_stopped() {
            return;
        }
        {
            let mut dependents = self.inner.dependents.borrow_mut();
            if dependents.iter().any(|c| c.id() == computation.id()) {
                return;
            }
            dependents.push(computation.clone());
        }
        let strong: Rc<dyn DependencySource> = self.inner.clone();
        let source: Weak<dyn DependencySource> = Rc::downgrade(&strong);
        computation.add_dependency(source);
    }

    /// Adds a listener that receives every event until its registration is
    /// removed.
    pub fn add_listener(&self, listener: impl Fn(&E) + 'static) -> Registration {
        self.purge_revoked();
        let registration = Registration::new();
        self.inner
            .listeners
            .borrow_mut()
            .push((registration.flag(), Rc::new(listener)));
        registration
    }

    /// Like [`add_listener`](Self::add_listener), but when `tracker` has a
    /// running computation the registration is removed as soon as that
    /// computation is invalidated. A computation that re-adds the listener on
    /// every run therefore never accumulates duplicates.
    pub fn add_scoped_listener(
        &self,
        tracker: &Tracker,
        listener: impl Fn(&E) + 'static,
    ) -> Registration {
        let registration = self.add_listener(listener);
        if let Some(computation) = tracker.computation() {
            let scoped = registration.clone();
            computation.on_next_invalidate(move |_| scoped.remove());
        }
        registration
    }

    /// Adds a listener that runs on the next fire only.
    pub fn on_next_fire(&self, listener: impl FnOnce(&E) + 'static) {
        self.inner.one_shot.borrow_mut().push(Box::new(listener));
    }

    /// Fires `event`.
    ///
    /// Delivery order: persistent listeners, one-shot listeners, then every
    /// dependent computation is marked dirty. All of it happens before this
    /// call returns; no computation body runs here.
    pub fn fire(&self, event: E) {
        let dependents = std::mem::take(&mut *self.inner.dependents.borrow_mut());
        let one_shot = std::mem::take(&mut *self.inner.one_shot.borrow_mut());
        let listeners: Vec<(Rc<Cell<bool>>, Listener<E>)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(revoked, _)| !revoked.get())
            .map(|(revoked, listener)| (Rc::clone(revoked), Rc::clone(listener)))
            .collect();

        trace!(
            router = self.inner.id,
            dependents = dependents.len(),
            one_shot = one_shot.len(),
            listeners = listeners.len(),
            "router fire"
        );

        for (revoked, listener) in listeners {
            // An earlier listener may have revoked this one.
            if !revoked.get() {
                listener(&event);
            }
        }
        for listener in one_shot {
            listener(&event);
        }
        for computation in dependents {
            computation.invalidate();
        }
        self.purge_revoked();
    }

    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.borrow().len()
    }

    pub fn has_dependent(&self, computation: &Computation) -> bool {
        self.inner
            .dependents
            .borrow()
            .iter()
            .any(|c| c.id() == computation.id())
    }

    /// Number of live (not revoked) persistent listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(revoked, _)| !revoked.get())
            .count()
    }

    fn purge_revoked(&self) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(revoked, _)| !revoked.get());
    }
}

impl EventRouter<()> {
    /// Fires a payload-less invalidation.
    pub fn invalidate(&self) {
        self.fire(());
    }
}
