use core::cell::Cell;
use std::{
    collections::HashSet,
    rc::Rc,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread::scope,
};

use crate::{
    AtomicIdGenerator, BasicIdGenerator, EntityId, Error, IdGenStatus, IdGenerator,
    LockIdGenerator, MAX_CLOCK_SKEW_MS, MonotonicClock, TimeSource,
};

struct MockTime {
    millis: u64,
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

struct FixedTime;

impl TimeSource for FixedTime {
    fn current_millis(&self) -> u64 {
        0
    }
}

/// A clock whose reading is advanced manually by the test.
#[derive(Clone)]
struct SharedMockStepTime {
    clock: Rc<MockStepTime>,
}

struct MockStepTime {
    values: Vec<u64>,
    index: Cell<usize>,
}

impl TimeSource for SharedMockStepTime {
    fn current_millis(&self) -> u64 {
        self.clock.values[self.clock.index.get()]
    }
}

fn step_time(values: Vec<u64>) -> SharedMockStepTime {
    SharedMockStepTime {
        clock: Rc::new(MockStepTime {
            values,
            index: Cell::new(0),
        }),
    }
}

/// A clock that advances through `values` one reading at a time, then stays
/// on the last value.
#[derive(Clone)]
struct SteppingTime {
    inner: Arc<SteppingTimeInner>,
}

struct SteppingTimeInner {
    values: Vec<u64>,
    index: AtomicUsize,
}

impl TimeSource for SteppingTime {
    fn current_millis(&self) -> u64 {
        let i = self.inner.index.fetch_add(1, Ordering::Relaxed);
        self.inner.values[i.min(self.inner.values.len() - 1)]
    }
}

fn stepping_time(values: Vec<u64>) -> SteppingTime {
    SteppingTime {
        inner: Arc::new(SteppingTimeInner {
            values,
            index: AtomicUsize::new(0),
        }),
    }
}

trait IdGenStatusExt {
    fn unwrap_ready(self) -> EntityId;
    fn unwrap_pending(self) -> u64;
    fn unwrap_behind(self) -> u64;
}

impl IdGenStatusExt for IdGenStatus {
    fn unwrap_ready(self) -> EntityId {
        match self {
            Self::Ready { id } => id,
            other => panic!("unexpected status: {other:?}"),
        }
    }

    fn unwrap_pending(self) -> u64 {
        match self {
            Self::Pending { yield_for } => yield_for,
            other => panic!("unexpected status: {other:?}"),
        }
    }

    fn unwrap_behind(self) -> u64 {
        match self {
            Self::Behind { gap } => gap,
            other => panic!("unexpected status: {other:?}"),
        }
    }
}

fn run_sequence_increments_within_same_tick<G, T>(generator: &G)
where
    G: IdGenerator<T>,
    T: TimeSource,
{
    let id1 = generator.try_poll_id().unwrap().unwrap_ready();
    let id2 = generator.try_poll_id().unwrap().unwrap_ready();
    let id3 = generator.try_poll_id().unwrap().unwrap_ready();

    assert_eq!(id1.timestamp(), 42);
    assert_eq!(id2.timestamp(), 42);
    assert_eq!(id3.timestamp(), 42);
    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
    assert_eq!(id3.sequence(), 2);
    assert!(id1 < id2 && id2 < id3);
}

fn run_pending_when_sequence_exhausted<G, T>(generator: &G)
where
    G: IdGenerator<T>,
    T: TimeSource,
{
    let yield_for = generator.try_poll_id().unwrap().unwrap_pending();
    assert_eq!(yield_for, 1);
}

/// Exhausts one tick (4096 keys), observes the bounded wait, then verifies
/// the next tick restarts the sequence at zero with no duplicates.
fn run_generator_handles_rollover<G, T>(generator: &G, shared_time: &SharedMockStepTime)
where
    G: IdGenerator<T>,
    T: TimeSource,
{
    let mut seen = HashSet::new();

    for i in 0..=EntityId::max_sequence() {
        let id = generator.try_poll_id().unwrap().unwrap_ready();
        assert_eq!(id.sequence(), i);
        assert_eq!(id.timestamp(), 42);
        assert!(seen.insert(id));
    }

    let yield_for = generator.try_poll_id().unwrap().unwrap_pending();
    assert_eq!(yield_for, 1);

    shared_time.clock.index.set(1);

    let id = generator.try_poll_id().unwrap().unwrap_ready();
    assert_eq!(id.timestamp(), 43);
    assert_eq!(id.sequence(), 0);
    assert!(seen.insert(id));
}

fn run_generator_monotonic<G, T>(generator: &G)
where
    G: IdGenerator<T>,
    T: TimeSource,
{
    const TOTAL_IDS: usize = 4096 * 256;

    let mut last_timestamp = 0;
    let mut sequence = 0;

    for _ in 0..TOTAL_IDS {
        loop {
            match generator.try_poll_id().unwrap() {
                IdGenStatus::Ready { id } => {
                    let ts = id.timestamp();
                    if ts > last_timestamp {
                        sequence = 0;
                    }

                    assert!(ts >= last_timestamp);
                    assert_eq!(id.worker_id(), 1);
                    assert_eq!(id.sequence(), sequence);

                    last_timestamp = ts;
                    sequence += 1;
                    break;
                }
                IdGenStatus::Pending { .. } => core::hint::spin_loop(),
                IdGenStatus::Behind { gap } => panic!("monotonic clock regressed by {gap}ms"),
            }
        }
    }
}

fn run_generator_threaded_unique<G, T>(make_generator: impl Fn() -> G)
where
    G: IdGenerator<T> + Send + Sync,
    T: TimeSource,
{
    const THREADS: usize = 8;
    const TOTAL_IDS: usize = 4096 * 256;
    const IDS_PER_THREAD: usize = TOTAL_IDS / THREADS;

    let generator = Arc::new(make_generator());
    let seen_ids = Arc::new(Mutex::new(HashSet::with_capacity(TOTAL_IDS)));

    scope(|s| {
        for _ in 0..THREADS {
            let generator = Arc::clone(&generator);
            let seen_ids = Arc::clone(&seen_ids);

            s.spawn(move || {
                for _ in 0..IDS_PER_THREAD {
                    let id = generator.generate_id().unwrap();
                    assert!(seen_ids.lock().unwrap().insert(id));
                }
            });
        }
    });

    let final_count = seen_ids.lock().unwrap().len();
    assert_eq!(final_count, TOTAL_IDS, "Expected {TOTAL_IDS} unique IDs");
}

fn run_worker_id_bounds<G, T>(make_generator: impl Fn(u64) -> crate::Result<G>)
where
    G: IdGenerator<T>,
    T: TimeSource,
{
    assert!(make_generator(0).is_ok());
    assert!(make_generator(EntityId::max_worker_id()).is_ok());

    let worker_id = EntityId::max_worker_id() + 1;
    match make_generator(worker_id) {
        Err(Error::InvalidWorkerId { worker_id: w }) => assert_eq!(w, worker_id),
        other => panic!("expected InvalidWorkerId, got {:?}", other.err()),
    }
}

fn run_clock_behind_reported<G, T>(generator: &G, shared_time: &SharedMockStepTime)
where
    G: IdGenerator<T>,
    T: TimeSource,
{
    let id = generator.try_poll_id().unwrap().unwrap_ready();
    assert_eq!(id.timestamp(), 42);

    shared_time.clock.index.set(1);

    let gap = generator.try_poll_id().unwrap().unwrap_behind();
    assert_eq!(gap, 2);
}

#[test]
fn basic_generator_sequence_test() {
    let mock_time = MockTime { millis: 42 };
    let generator = BasicIdGenerator::new(0, mock_time).unwrap();
    run_sequence_increments_within_same_tick(&generator);
}

#[test]
fn lock_generator_sequence_test() {
    let mock_time = MockTime { millis: 42 };
    let generator = LockIdGenerator::new(0, mock_time).unwrap();
    run_sequence_increments_within_same_tick(&generator);
}

#[test]
fn atomic_generator_sequence_test() {
    let mock_time = MockTime { millis: 42 };
    let generator = AtomicIdGenerator::new(0, mock_time).unwrap();
    run_sequence_increments_within_same_tick(&generator);
}

#[test]
fn basic_generator_pending_test() {
    let generator =
        BasicIdGenerator::from_components(0, 0, EntityId::max_sequence(), FixedTime).unwrap();
    run_pending_when_sequence_exhausted(&generator);
}

#[test]
fn lock_generator_pending_test() {
    let generator =
        LockIdGenerator::from_components(0, 0, EntityId::max_sequence(), FixedTime).unwrap();
    run_pending_when_sequence_exhausted(&generator);
}

#[test]
fn atomic_generator_pending_test() {
    let generator =
        AtomicIdGenerator::from_components(0, 0, EntityId::max_sequence(), FixedTime).unwrap();
    run_pending_when_sequence_exhausted(&generator);
}

#[test]
fn basic_generator_rollover_test() {
    let shared_time = step_time(vec![42, 43]);
    let generator = BasicIdGenerator::new(1, shared_time.clone()).unwrap();
    run_generator_handles_rollover(&generator, &shared_time);
}

#[test]
fn lock_generator_rollover_test() {
    let shared_time = step_time(vec![42, 43]);
    let generator = LockIdGenerator::new(1, shared_time.clone()).unwrap();
    run_generator_handles_rollover(&generator, &shared_time);
}

#[test]
fn atomic_generator_rollover_test() {
    let shared_time = step_time(vec![42, 43]);
    let generator = AtomicIdGenerator::new(1, shared_time.clone()).unwrap();
    run_generator_handles_rollover(&generator, &shared_time);
}

#[test]
fn basic_generator_monotonic_clock_sequence_increments() {
    let clock = MonotonicClock::default();
    let generator = BasicIdGenerator::new(1, clock).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn lock_generator_monotonic_clock_sequence_increments() {
    let clock = MonotonicClock::default();
    let generator = LockIdGenerator::new(1, clock).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn atomic_generator_monotonic_clock_sequence_increments() {
    let clock = MonotonicClock::default();
    let generator = AtomicIdGenerator::new(1, clock).unwrap();
    run_generator_monotonic(&generator);
}

#[test]
fn lock_generator_threaded_unique() {
    let clock = MonotonicClock::default();
    run_generator_threaded_unique(move || {
        LockIdGenerator::new(0, clock.clone()).unwrap()
    });
}

#[test]
fn atomic_generator_threaded_unique() {
    let clock = MonotonicClock::default();
    run_generator_threaded_unique(move || {
        AtomicIdGenerator::new(0, clock.clone()).unwrap()
    });
}

#[test]
fn basic_generator_worker_id_bounds() {
    run_worker_id_bounds(|worker_id| BasicIdGenerator::new(worker_id, MockTime { millis: 42 }));
}

#[test]
fn lock_generator_worker_id_bounds() {
    run_worker_id_bounds(|worker_id| LockIdGenerator::new(worker_id, MockTime { millis: 42 }));
}

#[test]
fn atomic_generator_worker_id_bounds() {
    run_worker_id_bounds(|worker_id| AtomicIdGenerator::new(worker_id, MockTime { millis: 42 }));
}

#[test]
fn basic_generator_reports_clock_behind() {
    let shared_time = step_time(vec![42, 40]);
    let generator = BasicIdGenerator::new(1, shared_time.clone()).unwrap();
    run_clock_behind_reported(&generator, &shared_time);
}

#[test]
fn lock_generator_reports_clock_behind() {
    let shared_time = step_time(vec![42, 40]);
    let generator = LockIdGenerator::new(1, shared_time.clone()).unwrap();
    run_clock_behind_reported(&generator, &shared_time);
}

#[test]
fn atomic_generator_reports_clock_behind() {
    let shared_time = step_time(vec![42, 40]);
    let generator = AtomicIdGenerator::new(1, shared_time.clone()).unwrap();
    run_clock_behind_reported(&generator, &shared_time);
}

#[test]
fn generate_id_waits_out_small_clock_rollback() {
    let time = stepping_time(vec![42, 40, 43]);
    let generator = LockIdGenerator::new(1, time).unwrap();

    let id1 = generator.generate_id().unwrap();
    assert_eq!(id1.timestamp(), 42);

    // The next reading regresses by 2ms, within tolerance: the call sleeps
    // until the clock catches up and never emits a regressed timestamp.
    let id2 = generator.generate_id().unwrap();
    assert_eq!(id2.timestamp(), 43);
    assert!(id2 > id1);
}

#[test]
fn generate_id_rejects_large_clock_rollback() {
    let lag = MAX_CLOCK_SKEW_MS + 10;
    let shared_time = step_time(vec![100, 100 - lag]);
    let generator = LockIdGenerator::new(1, shared_time.clone()).unwrap();

    let id = generator.generate_id().unwrap();
    assert_eq!(id.timestamp(), 100);

    shared_time.clock.index.set(1);

    assert_eq!(
        generator.generate_id(),
        Err(Error::ClockSkew { lag_ms: lag })
    );
}

#[test]
fn generate_id_rejects_clock_stuck_behind() {
    // A small rollback is tolerated, but a clock that never catches up must
    // not stall the caller forever.
    let shared_time = step_time(vec![50, 45]);
    let generator = AtomicIdGenerator::new(1, shared_time.clone()).unwrap();

    let id = generator.generate_id().unwrap();
    assert_eq!(id.timestamp(), 50);

    shared_time.clock.index.set(1);

    assert_eq!(
        generator.generate_id(),
        Err(Error::ClockSkew { lag_ms: 5 })
    );
}

#[test]
fn generate_id_is_strictly_monotonic() {
    let generator = BasicIdGenerator::new(3, MonotonicClock::default()).unwrap();

    let mut last = generator.generate_id().unwrap();
    for _ in 0..10_000 {
        let next = generator.generate_id().unwrap();
        assert!(next > last);
        last = next;
    }
}

#[test]
fn generated_ids_decompose_to_configured_worker() {
    let clock = MonotonicClock::default();
    let generator = LockIdGenerator::new(7, clock.clone()).unwrap();

    let id = generator.generate_id().unwrap();
    let now = clock.current_millis();

    assert_eq!(id.worker_id(), 7);
    assert!(id.timestamp() <= now);
    assert!(now - id.timestamp() <= 100, "timestamp drifted {}ms", now - id.timestamp());
}
