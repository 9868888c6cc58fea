use crate::EntityId;

/// The outcome of a single non-blocking generation attempt.
///
/// This models one pass over the generator's critical section:
///
/// - [`IdGenStatus::Ready`]: a new key was minted.
/// - [`IdGenStatus::Pending`]: the sequence for the current millisecond is
///   exhausted (or a compare-exchange race was lost); retry after
///   `yield_for` milliseconds.
/// - [`IdGenStatus::Behind`]: the clock reported a time earlier than the
///   last observed timestamp. No key is minted; see the skew policy on
///   [`IdGenerator::generate_id`].
///
/// Callers that do not want to manage backoff themselves should use
/// [`IdGenerator::generate_id`], which loops over this status with the
/// documented wait bounds.
///
/// [`IdGenerator::generate_id`]: crate::generator::IdGenerator::generate_id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGenStatus {
    /// A unique key was minted and is ready to use.
    Ready {
        /// The generated key.
        id: EntityId,
    },
    /// No key could be minted on this attempt. Retry once `yield_for`
    /// milliseconds have passed (`0` means retry immediately: another
    /// caller won a compare-exchange race).
    Pending {
        /// Milliseconds to wait before the next attempt.
        yield_for: u64,
    },
    /// The clock is running behind the last observed timestamp. Minting
    /// would regress the key ordering, so nothing was produced.
    Behind {
        /// How far behind the clock reads, in milliseconds.
        gap: u64,
    },
}
