use core::time::Duration;
use std::thread;

use crate::{error::{Error, Result}, id::EntityId, status::IdGenStatus, time::TimeSource};

/// Upper bound, in milliseconds, on a backward clock jump that
/// [`IdGenerator::generate_id`] absorbs by waiting.
///
/// A jump larger than this fails the call with [`Error::ClockSkew`], as does
/// a clock that is still behind once a per-call wait allowance of the same
/// size has been spent.
pub const MAX_CLOCK_SKEW_MS: u64 = 10;

/// A minimal interface for minting entity keys.
///
/// One generator instance is constructed at process start with a fixed
/// worker id and time source, then shared by every creation flow for the
/// process's lifetime. Construct separate instances (with distinct worker
/// ids) only for isolated tests.
pub trait IdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator for `worker_id` over the given time source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerId`] if `worker_id` does not fit the
    /// 10-bit worker field.
    fn new(worker_id: u64, time: T) -> Result<Self>
    where
        Self: Sized;

    /// Makes one non-blocking generation attempt.
    ///
    /// The read-check-update step runs indivisibly: concurrent callers never
    /// observe or produce an inconsistent `(timestamp, sequence)` pair. The
    /// returned [`IdGenStatus`] is either a fresh key, a bounded wait hint
    /// (sequence exhausted for this tick, or a lost compare-exchange race),
    /// or a report that the clock is running behind.
    ///
    /// # Errors
    ///
    /// May return an error if the underlying implementation uses a lock and
    /// it is poisoned.
    fn try_poll_id(&self) -> Result<IdGenStatus>;

    /// Mints the next entity key, waiting out bounded stalls.
    ///
    /// Loops over [`Self::try_poll_id`]:
    ///
    /// - sequence exhaustion sleeps until the next millisecond tick and
    ///   retries; at most a few milliseconds, never an error;
    /// - a lost compare-exchange race retries immediately;
    /// - a backward clock jump of at most [`MAX_CLOCK_SKEW_MS`] is absorbed
    ///   by sleeping until the clock catches up, with the total skew wait
    ///   per call also capped at [`MAX_CLOCK_SKEW_MS`]. A larger jump, or a
    ///   clock still behind once the allowance is spent, fails with
    ///   [`Error::ClockSkew`].
    ///
    /// The returned key is never equal to a previously returned key of this
    /// instance, and its timestamp field never regresses below that of any
    /// previously returned key.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockSkew`] per the policy above. The caller must fail
    ///   the entity-creation request; it may retry later.
    /// - [`Error::LockPoisoned`] if the implementation locks and a holder
    ///   panicked.
    fn generate_id(&self) -> Result<EntityId> {
        let mut skew_waited = 0u64;
        loop {
            match self.try_poll_id()? {
                IdGenStatus::Ready { id } => break Ok(id),
                IdGenStatus::Pending { yield_for: 0 } => core::hint::spin_loop(),
                IdGenStatus::Pending { yield_for } => {
                    thread::sleep(Duration::from_millis(yield_for));
                }
                IdGenStatus::Behind { gap } => {
                    if gap > MAX_CLOCK_SKEW_MS || skew_waited >= MAX_CLOCK_SKEW_MS {
                        break Err(Error::ClockSkew { lag_ms: gap });
                    }
                    thread::sleep(Duration::from_millis(gap));
                    skew_waited += gap;
                }
            }
        }
    }
}
