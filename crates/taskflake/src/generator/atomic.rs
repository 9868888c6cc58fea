use core::cmp;

use portable_atomic::{AtomicU64, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    error::{Error, Result},
    generator::IdGenerator,
    id::EntityId,
    status::IdGenStatus,
    time::TimeSource,
};

/// A lock-free key generator suitable for multi-threaded environments.
///
/// The packed `(timestamp, worker, sequence)` state lives in a single
/// [`AtomicU64`]; every generation attempt is a compare-exchange over the
/// whole word, so concurrent callers never observe an inconsistent pair. A
/// lost race simply retries.
///
/// ## Recommended When
/// - You're in a multi-threaded environment
/// - Fair access is sacrificed for higher throughput
///
/// ## See Also
/// - [`BasicIdGenerator`]
/// - [`LockIdGenerator`]
///
/// [`BasicIdGenerator`]: crate::generator::BasicIdGenerator
/// [`LockIdGenerator`]: crate::generator::LockIdGenerator
pub struct AtomicIdGenerator<T>
where
    T: TimeSource,
{
    #[cfg(feature = "cache-padded")]
    state: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    state: AtomicU64,
    time: T,
}

impl<T> AtomicIdGenerator<T>
where
    T: TimeSource,
{
    /// Creates a new [`AtomicIdGenerator`] for `worker_id` over the given
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
    /// use taskflake::{AtomicIdGenerator, IdGenerator, MonotonicClock};
    ///
    /// let generator = AtomicIdGenerator::new(0, MonotonicClock::default())?;
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
        let initial = EntityId::from_components(timestamp, worker_id, sequence);
        Ok(Self {
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(AtomicU64::new(initial.to_raw())),
            #[cfg(not(feature = "cache-padded"))]
            state: AtomicU64::new(initial.to_raw()),
            time,
        })
    }

    /// Makes one non-blocking generation attempt via compare-exchange. See
    /// [`IdGenerator::try_poll_id`].
    ///
    /// A lost race reports [`IdGenStatus::Pending`] with `yield_for: 0`,
    /// meaning retry immediately.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_poll_id(&self) -> Result<IdGenStatus> {
        let now = self.time.current_millis();

        let current_raw = self.state.load(Ordering::Relaxed);
        let current_id = EntityId::from_raw(current_raw);
        let current_ts = current_id.timestamp();

        let next_id = match now.cmp(&current_ts) {
            cmp::Ordering::Equal => {
                if current_id.has_sequence_room() {
                    current_id.increment_sequence()
                } else {
                    return Ok(IdGenStatus::Pending { yield_for: 1 });
                }
            }
            cmp::Ordering::Greater => current_id.rollover_to_timestamp(now),
            cmp::Ordering::Less => {
                return Ok(Self::cold_clock_behind(now, current_ts));
            }
        };

        if self
            .state
            .compare_exchange(
                current_raw,
                next_id.to_raw(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            Ok(IdGenStatus::Ready { id: next_id })
        } else {
            // CAS failed - another thread won the race. Yield 0 to retry
            // immediately.
            Ok(IdGenStatus::Pending { yield_for: 0 })
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

impl<T> IdGenerator<T> for AtomicIdGenerator<T>
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
