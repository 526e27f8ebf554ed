//! Fine-grained reactive engine for statetree.
//!
//! # Overview
//!
//! - [`EventRouter`] is a reactive source. Reads call
//!   [`EventRouter::register_read`], mutations call [`EventRouter::fire`].
//! - [`Computation`] is a re-runnable body whose dependencies are re-derived
//!   on every run.
//! - [`Reactive`] owns the queue of dirty computations and runs them in
//!   [`Reactive::flush`].
//! - [`Tracker`] is the explicit "currently running computation" handle
//!   threaded through every reactive read.
//!
//! Nothing recomputes inside the mutation that dirtied it: invalidation only
//! queues, and the queue drains on the next `flush()`. Listeners attached to a
//! router are the exception, they fire before `fire()` returns.
//!
//! The engine is single-threaded (`Rc`/`RefCell`); each tree and its
//! scheduler belong to one thread of control.

mod computation;
mod config;
mod error;
mod registration;
mod router;
mod scheduler;
mod tracker;

pub use computation::{Computation, ComputationId, ComputationState};
pub use config::ReactiveConfig;
pub use error::ReactiveError;
pub use registration::Registration;
pub use router::{EventRouter, RouterId};
pub use scheduler::{FlushStats, Reactive};
pub use tracker::{run_with_computation, Tracker};
