use std::sync::{MutexGuard, PoisonError};

use crate::EntityId;

/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors the key allocator can produce.
///
/// There is no exhaustion variant: running out of sequence numbers within a
/// millisecond is absorbed by waiting for the next tick, never reported as an
/// error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The worker id does not fit the 10-bit worker field.
    ///
    /// Raised once at construction. A generator is never created with an
    /// invalid worker id, so startup must treat this as fatal.
    #[error("worker id {worker_id} out of range 0..={max}", max = EntityId::max_worker_id())]
    InvalidWorkerId { worker_id: u64 },

    /// The clock was observed `lag_ms` behind the last issued timestamp and
    /// did not catch up within the tolerated skew window.
    ///
    /// The caller must fail the creation request that triggered this call;
    /// retrying is safe once the clock has caught up.
    #[error("clock moved backwards by {lag_ms}ms, beyond the tolerated skew")]
    ClockSkew { lag_ms: u64 },

    /// A thread panicked while holding the generator lock.
    ///
    /// Only produced by [`LockIdGenerator`].
    ///
    /// [`LockIdGenerator`]: crate::generator::LockIdGenerator
    #[error("generator lock poisoned")]
    LockPoisoned,
}

// Convert all poisoned lock errors to a simplified `LockPoisoned`
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
