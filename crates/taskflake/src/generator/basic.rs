use core::{cell::Cell, cmp::Ordering};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    error::{Error, Result},
    generator::IdGenerator,
    id::EntityId,
    status::IdGenStatus,
    time::TimeSource,
};

/// A non-concurrent key generator suitable for single-threaded environments.
///
/// This generator is lightweight and fast, but **not thread-safe**.
///
/// ## Recommended When
/// - You're in a single-threaded environment (no shared access)
/// - You want the fastest generator
///
/// ## See Also
/// - [`LockIdGenerator`]
/// - [`AtomicIdGenerator`]
///
/// [`LockIdGenerator`]: crate::generator::LockIdGenerator
/// [`AtomicIdGenerator`]: crate::generator::AtomicIdGenerator
pub struct BasicIdGenerator<T>
where
    T: TimeSource,
{
    state: Cell<EntityId>,
    time: T,
}

impl<T> BasicIdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a new [`BasicIdGenerator`] for `worker_id` over the given
    /// time source.
    ///
    /// The initial timestamp and sequence are zero; the first call observes
    /// the current time and rolls the state forward.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerId`] if `worker_id` exceeds
    /// [`EntityId::max_worker_id`].
    ///
    /// # Example
    /// ```
    /// use taskflake::{BasicIdGenerator, IdGenerator, MonotonicClock};
    ///
    /// let generator = BasicIdGenerator::new(0, MonotonicClock::default())?;
    /// let id = generator.generate_id()?;
    /// assert_eq!(id.worker_id(), 0);
    /// # Ok::<(), taskflake::Error>(())
    /// ```
    pub fn new(worker_id: u64, time: T) -> Result<Self> {
        Self::from_components(0, worker_id, 0, time)
    }

    /// Creates a generator preloaded with explicit component values.
    ///
    /// Primarily useful in tests that need to start at a known
    /// `(timestamp, sequence)` state. Prefer [`Self::new`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWorkerId`] if `worker_id` exceeds
    /// [`EntityId::max_worker_id`].
    pub fn from_components(timestamp: u64, worker_id: u64, sequence: u64, time: T) -> Result<Self> {
        if worker_id > EntityId::max_worker_id() {
            return Err(Error::InvalidWorkerId { worker_id });
        }
        let id = EntityId::from_components(timestamp, worker_id, sequence);
        Ok(Self {
            state: Cell::new(id),
            time,
        })
    }

    /// Makes one non-blocking generation attempt. See
    /// [`IdGenerator::try_poll_id`].
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let now = self.time.current_millis();
        let state = self.state.get();
        let current_ts = state.timestamp();

        match now.cmp(&current_ts) {
            Ordering::Equal => {
                if state.has_sequence_room() {
                    let updated = state.increment_sequence();
                    self.state.set(updated);
                    Ok(IdGenStatus::Ready { id: updated })
                } else {
                    Ok(IdGenStatus::Pending { yield_for: 1 })
                }
            }
            Ordering::Greater => {
                let updated = state.rollover_to_timestamp(now);
                self.state.set(updated);
                Ok(IdGenStatus::Ready { id: updated })
            }
            Ordering::Less => Ok(Self::cold_clock_behind(now, current_ts)),
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, current_ts: u64) -> IdGenStatus {
        debug_assert!(current_ts > now);
        IdGenStatus::Behind {
            gap: current_ts - now,
        }
    }
}

impl<T> IdGenerator<T> for BasicIdGenerator<T>
where
    T: TimeSource,
{
    fn new(worker_id: u64, time: T) -> Result<Self> {
        Self::new(worker_id, time)
    }

    fn try_poll_id(&self) -> Result<IdGenStatus> {
        self.try_poll_id()
    }
}
