use core::fmt;

/// A packed 64-bit primary key for task-service entities.
///
/// Every key minted by a generator (for a task, a task type, or a tag)
/// shares one fixed bit layout, packed from **MSB to LSB**:
///
/// ```text
///  Bit Index:  63         62             22 21          12 11           0
///              +-----------+----------------+-------------+-------------+
///  Field:      | reserved  | timestamp (41) | worker (10) | seq (12)    |
///              +-----------+----------------+-------------+-------------+
///              |<--------- MSB --------- 64 bits --------- LSB -------->|
/// ```
///
/// The reserved bit is always zero, so a key is non-negative when stored in a
/// signed 64-bit database column. The timestamp field counts milliseconds
/// since the epoch configured on the generator's [`TimeSource`], which keeps
/// keys from one instance ordered by creation time.
///
/// [`TimeSource`]: crate::time::TimeSource
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId {
    id: u64,
}

const _: () = {
    // Compile-time check: the four fields must cover the backing integer
    // exactly. This is to avoid aliasing surprises.
    assert!(
        EntityId::RESERVED_BITS
            + EntityId::TIMESTAMP_BITS
            + EntityId::WORKER_BITS
            + EntityId::SEQUENCE_BITS
            == u64::BITS,
        "EntityId layout must match the underlying type width"
    );
};

impl EntityId {
    pub const RESERVED_BITS: u32 = 1;
    pub const TIMESTAMP_BITS: u32 = 41;
    pub const WORKER_BITS: u32 = 10;
    pub const SEQUENCE_BITS: u32 = 12;

    pub const SEQUENCE_SHIFT: u32 = 0;
    pub const WORKER_SHIFT: u32 = Self::SEQUENCE_SHIFT + Self::SEQUENCE_BITS;
    pub const TIMESTAMP_SHIFT: u32 = Self::WORKER_SHIFT + Self::WORKER_BITS;
    pub const RESERVED_SHIFT: u32 = Self::TIMESTAMP_SHIFT + Self::TIMESTAMP_BITS;

    pub const TIMESTAMP_MASK: u64 = (1 << Self::TIMESTAMP_BITS) - 1;
    pub const WORKER_MASK: u64 = (1 << Self::WORKER_BITS) - 1;
    pub const SEQUENCE_MASK: u64 = (1 << Self::SEQUENCE_BITS) - 1;

    const fn valid_mask() -> u64 {
        (Self::TIMESTAMP_MASK << Self::TIMESTAMP_SHIFT)
            | (Self::WORKER_MASK << Self::WORKER_SHIFT)
            | (Self::SEQUENCE_MASK << Self::SEQUENCE_SHIFT)
    }

    /// Packs a key from its components. Each component is masked to its
    /// field width.
    #[must_use]
    pub const fn from_components(timestamp: u64, worker_id: u64, sequence: u64) -> Self {
        let t = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let w = (worker_id & Self::WORKER_MASK) << Self::WORKER_SHIFT;
        let s = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
        Self { id: t | w | s }
    }

    /// Extracts the timestamp field: milliseconds since the configured epoch.
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts the worker field: the instance that minted this key.
    #[must_use]
    pub const fn worker_id(&self) -> u64 {
        (self.id >> Self::WORKER_SHIFT) & Self::WORKER_MASK
    }

    /// Extracts the sequence field: the per-millisecond counter.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    /// Returns the maximum representable timestamp value.
    #[must_use]
    pub const fn max_timestamp() -> u64 {
        Self::TIMESTAMP_MASK
    }

    /// Returns the maximum valid worker id.
    #[must_use]
    pub const fn max_worker_id() -> u64 {
        Self::WORKER_MASK
    }

    /// Returns the maximum sequence value within one millisecond.
    #[must_use]
    pub const fn max_sequence() -> u64 {
        Self::SEQUENCE_MASK
    }

    /// Converts this key into its raw `u64` representation.
    #[must_use]
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Converts a raw `u64` into a key without validation. See
    /// [`Self::is_valid`].
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns `true` if the reserved bit is unset.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        (self.id & !Self::valid_mask()) == 0
    }

    /// Returns this key as a signed 64-bit integer, the natural type for a
    /// database primary-key column. The reserved bit is zero by
    /// construction, so the value is never negative.
    #[must_use]
    pub const fn to_i64(self) -> i64 {
        self.id as i64
    }

    /// Returns true if the current sequence value can be incremented within
    /// this millisecond.
    pub(crate) const fn has_sequence_room(&self) -> bool {
        self.sequence() < Self::max_sequence()
    }

    /// Returns a new key with the sequence incremented, same tick.
    #[must_use]
    pub(crate) const fn increment_sequence(&self) -> Self {
        Self::from_components(self.timestamp(), self.worker_id(), self.sequence() + 1)
    }

    /// Returns a new key for a newer tick with the sequence reset to zero.
    #[must_use]
    pub(crate) const fn rollover_to_timestamp(&self, ts: u64) -> Self {
        Self::from_components(ts, self.worker_id(), 0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityId")
            .field("timestamp", &self.timestamp())
            .field("worker_id", &self.worker_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.to_raw()
    }
}

impl From<EntityId> for i64 {
    fn from(id: EntityId) -> Self {
        id.to_i64()
    }
}
