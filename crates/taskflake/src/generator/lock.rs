use core::cmp::Ordering;
use std::sync::{Arc, Mutex};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    error::{Error, Result},
    generator::IdGenerator,
    id::EntityId,
    status::IdGenStatus,
    time::TimeSource,
};

/// A lock-based key generator suitable for multi-threaded environments.
///
/// The packed `(timestamp, worker, sequence)` state lives behind an
/// [`Arc<Mutex<_>>`]; every generation attempt runs the read-check-update
/// step inside the critical section, so concurrent callers never observe an
/// inconsistent pair.
///
/// ## Recommended When
/// - You're in a multi-threaded environment
/// - Fair access across threads is important
///
/// ## See Also
/// - [`BasicIdGenerator`]
/// - [`AtomicIdGenerator`]
///
/// [`BasicIdGenerator`]: crate::generator::BasicIdGenerator
/// [`AtomicIdGenerator`]: crate::generator::AtomicIdGenerator
pub struct LockIdGenerator<T>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: Arc<crossbeam_utils::CachePadded<Mutex<EntityId>>>,
    #[cfg(not(feature = "cache-padded"))]
    state: Arc<Mutex<EntityId>>,
    time: T,
}

impl<T> LockIdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a new [`LockIdGenerator`] for `worker_id` over the given time
    /// source.
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
    /// use taskflake::{IdGenerator, LockIdGenerator, MonotonicClock};
    ///
    /// let generator = LockIdGenerator::new(0, MonotonicClock::default())?;
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
            #[cfg(feature = "cache-padded")]
            state: Arc::new(crossbeam_utils::CachePadded::new(Mutex::new(id))),
            #[cfg(not(feature = "cache-padded"))]
            state: Arc::new(Mutex::new(id)),
            time,
        })
    }

    /// Makes one non-blocking generation attempt under the lock. See
    /// [`IdGenerator::try_poll_id`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if a holder of the lock panicked.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let now = self.time.current_millis();
        let mut id = self.state.lock()?;

        let current_ts = id.timestamp();
        match now.cmp(&current_ts) {
            Ordering::Equal => {
                if id.has_sequence_room() {
                    *id = id.increment_sequence();
                    Ok(IdGenStatus::Ready { id: *id })
                } else {
                    Ok(IdGenStatus::Pending { yield_for: 1 })
                }
            }
            Ordering::Greater => {
                *id = id.rollover_to_timestamp(now);
                Ok(IdGenStatus::Ready { id: *id })
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

impl<T> IdGenerator<T> for LockIdGenerator<T>
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
