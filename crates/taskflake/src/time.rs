use core::time::Duration;
use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

/// Service epoch: Monday, January 1, 2024 00:00:00 UTC.
///
/// The zero point for every timestamp field packed into an [`EntityId`].
/// This constant must not change once any key has been minted for a
/// deployment: keys produced against different epochs are neither unique nor
/// ordered relative to each other.
///
/// [`EntityId`]: crate::id::EntityId
pub const SERVICE_EPOCH: Duration = Duration::from_millis(1_704_067_200_000);

/// A source of millisecond timestamps relative to a configured epoch.
///
/// The generators read time exclusively through this trait, which is what
/// makes the clock-sensitive behavior (rollover, backward jumps) testable
/// with mocked sources.
///
/// # Example
///
/// ```
/// use taskflake::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the configured epoch.
    fn current_millis(&self) -> u64;
}

/// Shared ticker thread that updates every millisecond.
#[derive(Debug)]
struct SharedTickerInner {
    current: AtomicU64,
    _handle: OnceLock<JoinHandle<()>>,
}

/// A monotonic time source that returns elapsed time since process start,
/// offset from a user-defined epoch.
///
/// This avoids wall-clock adjustments (e.g., NTP or daylight savings changes)
/// while still aligning timestamps to a fixed origin. A generator driven by
/// this clock can never observe a backward jump, so the skew policy on
/// [`IdGenerator::generate_id`] only matters for wall-clock sources.
///
/// Internally, a background thread advances a shared atomic counter once per
/// millisecond, measured against an [`Instant`] captured at construction.
/// Reads on the hot path are a single atomic load, no syscall.
///
/// [`IdGenerator::generate_id`]: crate::generator::IdGenerator::generate_id
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    inner: Arc<SharedTickerInner>,
    epoch_offset: u64, // in milliseconds
}

impl Default for MonotonicClock {
    /// Constructs a monotonic clock aligned to [`SERVICE_EPOCH`].
    ///
    /// Panics if system time is earlier than the service epoch.
    fn default() -> Self {
        Self::with_epoch(SERVICE_EPOCH)
    }
}

impl MonotonicClock {
    /// Constructs a monotonic clock using a custom epoch as the origin
    /// (t = 0), specified as a duration since 1970-01-01 UTC.
    ///
    /// The wall clock is consulted exactly once, at construction, to compute
    /// the offset between the epoch and now. After that, timestamps advance
    /// with the monotonic timer and never move backward.
    ///
    /// # Panics
    ///
    /// Panics if the current system time is earlier than the given epoch.
    pub fn with_epoch(epoch: Duration) -> Self {
        let start = Instant::now();
        let system_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock before UNIX_EPOCH");
        let offset = system_now
            .checked_sub(epoch)
            .expect("System clock before custom epoch")
            .as_millis() as u64;

        let inner = Arc::new(SharedTickerInner {
            current: AtomicU64::new(0),
            _handle: OnceLock::new(),
        });

        let weak_inner = Arc::downgrade(&inner);
        let handle = thread::spawn(move || {
            let mut tick = 0;

            loop {
                // Stop ticking once every clock handle has been dropped.
                let Some(inner_ref) = weak_inner.upgrade() else {
                    break;
                };

                // Compute the absolute target time of the next tick
                let target = start + Duration::from_millis(tick);

                // Sleep if we are early
                let now = Instant::now();
                if now < target {
                    thread::sleep(target - now);
                }

                // After waking, recompute how far we actually are from the
                // start
                let now_ms = start.elapsed().as_millis() as u64;

                // Monotonic store, aligned to elapsed milliseconds since start
                inner_ref.current.store(now_ms, Ordering::Relaxed);

                // Align to next tick after the current actual time
                tick = now_ms + 1;
            }
        });

        inner
            ._handle
            .set(handle)
            .expect("failed to set thread handle");

        Self {
            inner,
            epoch_offset: offset,
        }
    }
}

impl TimeSource for MonotonicClock {
    /// Returns the number of milliseconds since the configured epoch, based
    /// on the elapsed monotonic time since construction.
    fn current_millis(&self) -> u64 {
        self.epoch_offset + self.inner.current.load(Ordering::Relaxed)
    }
}

/// A time source that reads the system wall clock on every call.
///
/// Unlike [`MonotonicClock`], this source is subject to external clock
/// adjustment and can report a time earlier than a previous reading. The
/// generators detect that case and apply the skew policy documented on
/// [`IdGenerator::generate_id`] instead of ever minting a regressed key.
///
/// A reading that lands before the configured epoch (or before 1970)
/// saturates to zero, which the generators surface as a backward jump.
///
/// [`IdGenerator::generate_id`]: crate::generator::IdGenerator::generate_id
#[derive(Clone, Debug)]
pub struct WallClock {
    epoch: Duration,
}

impl Default for WallClock {
    /// Constructs a wall clock aligned to [`SERVICE_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(SERVICE_EPOCH)
    }
}

impl WallClock {
    /// Constructs a wall clock using a custom epoch as the origin (t = 0),
    /// specified as a duration since 1970-01-01 UTC.
    pub fn with_epoch(epoch: Duration) -> Self {
        Self { epoch }
    }
}

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_sub(self.epoch)
            .as_millis() as u64
    }
}
