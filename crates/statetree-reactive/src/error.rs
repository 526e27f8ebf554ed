use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// Computations kept re-dirtying each other past the configured round
    /// limit. The still-dirty computations stay queued.
    #[error("flush did not settle after {rounds} rounds ({pending} computations still dirty)")]
    FlushLimitExceeded { rounds: usize, pending: usize },
}
