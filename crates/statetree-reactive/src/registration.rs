use std::cell::Cell;
use std::rc::Rc;

/// Handle returned by every listener registration.
///
/// Removal is per handle, not per listener: registering the same callback
/// twice yields two handles, and removing one leaves the other registered.
/// Dropping a handle does **not** remove the listener.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    revoked: Rc<Cell<bool>>,
}

impl Registration {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Shared revocation flag, checked by the owner before each delivery.
    pub(crate) fn flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.revoked)
    }

    /// Revokes the registration. Calling it again is a no-op.
    pub fn remove(&self) {
        self.revoked.set(true);
    }

    pub fn is_removed(&self) -> bool {
        self.revoked.get()
    }
}
