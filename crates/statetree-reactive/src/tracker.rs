use std::fmt;

use crate::computation::Computation;

/// Explicit "currently running computation" handle.
///
/// Every reactive read takes a `&Tracker`. A tracker bound to a computation
/// registers that computation as a dependent of whatever it reads; an
/// untracked one reads without creating dependencies.
#[derive(Clone, Default)]
pub struct Tracker {
    computation: Option<Computation>,
}

impl Tracker {
    /// A tracker that records nothing.
    pub fn untracked() -> Self {
        Self::default()
    }

    pub fn for_computation(computation: &Computation) -> Self {
        Self {
            computation: Some(computation.clone()),
        }
    }

    pub fn computation(&self) -> Option<&Computation> {
        self.computation.as_ref()
    }

    pub fn is_tracking(&self) -> bool {
        self.computation
            .as_ref()
            .is_some_and(|c| !c.is_stopped())
    }

    /// Runs `body` with dependency tracking switched off.
    pub fn untrack<R>(&self, body: impl FnOnce(&Tracker) -> R) -> R {
        run_with_computation(None, body)
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("computation", &self.computation.as_ref().map(Computation::id))
            .finish()
    }
}

/// Runs `body` with the current computation rebound to `computation`.
///
/// The rebinding lives in a fresh stack value handed to `body`, so the
/// caller's tracker is untouched on every exit path, unwinding included.
/// Passing `None` is the escape hatch for reading a source without becoming
/// dependent on it.
pub fn run_with_computation<R>(
    computation: Option<&Computation>,
    body: impl FnOnce(&Tracker) -> R,
) -> R {
    let scoped = Tracker {
        computation: computation.cloned(),
    };
    body(&scoped)
}
