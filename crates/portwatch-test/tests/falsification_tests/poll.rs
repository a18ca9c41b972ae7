//! Falsification Tests: Category B - Descriptor Set & Poll (F011-F025)

use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use portwatch_core::poll::{POLL_TOLERANCE_MS, PosixPoll};
use portwatch_core::{
    DescriptorSet, ErrorCode, Result, WaitOutcome, WaitPrimitive, Waitable, adjust_timeout,
    millis,
};
use portwatch_test::PollTiming;
use proptest::prelude::*;

/// `poll(2)` restricted to a handle-array style per-call limit.
#[derive(Debug)]
struct Bounded {
    limit: usize,
    largest_call: AtomicUsize,
}

impl Bounded {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            largest_call: AtomicUsize::new(0),
        }
    }
}

impl WaitPrimitive for Bounded {
    fn name(&self) -> &'static str {
        "bounded-poll"
    }

    fn limit(&self) -> Option<usize> {
        Some(self.limit)
    }

    fn wait(&self, objects: &[Waitable], timeout_ms: i32) -> Result<WaitOutcome> {
        self.largest_call.fetch_max(objects.len(), Ordering::SeqCst);
        assert!(objects.len() <= self.limit, "primitive called beyond its limit");
        PosixPoll.wait(objects, timeout_ms)
    }
}

fn pairs(n: usize) -> Vec<(UnixStream, UnixStream)> {
    (0..n).map(|_| UnixStream::pair().unwrap()).collect()
}

fn set_of(pairs: &[(UnixStream, UnixStream)]) -> DescriptorSet {
    let mut set = DescriptorSet::new();
    for (i, (host, _)) in pairs.iter().enumerate() {
        set.add(100 + i as u32, Waitable::Fd(host.as_raw_fd())).unwrap();
    }
    set
}

// =============================================================================
// F011-F014: Timing
// =============================================================================

/// F011: poll(0) on an empty set returns immediately with no IDs
#[test]
fn f011_empty_set_zero_timeout() {
    let start = Instant::now();
    let ready = DescriptorSet::new().poll(0).unwrap();
    assert!(ready.is_empty());
    assert!(
        start.elapsed() < Duration::from_millis(POLL_TOLERANCE_MS),
        "F011 FALSIFIED: poll(0) blocked for {:?}",
        start.elapsed()
    );
}

/// F012: poll(0) on a set with nothing ready returns immediately with no IDs
#[test]
fn f012_not_ready_zero_timeout() {
    let pairs = pairs(8);
    let timing = PollTiming::measure(&set_of(&pairs), 0).unwrap();
    timing.check_timed_out().expect("F012 FALSIFIED");
}

/// F013: poll(T) with nothing ready returns after at least T and at most T + ε
///
/// # Falsification Attempt
/// Several timeouts, native primitive; any early or late return refutes it.
#[test]
fn f013_timeout_is_honoured() {
    let pairs = pairs(3);
    let set = set_of(&pairs);
    for timeout in [1, 20, 50, 120] {
        let timing = PollTiming::measure(&set, timeout).unwrap();
        timing
            .check_timed_out()
            .unwrap_or_else(|e| panic!("F013 FALSIFIED: {e}"));
    }
}

/// F014: An empty set sleeps for a finite timeout instead of failing
#[test]
fn f014_empty_set_finite_timeout_sleeps() {
    let timing = PollTiming::measure(&DescriptorSet::new(), 30).unwrap();
    timing.check_timed_out().expect("F014 FALSIFIED");
}

// =============================================================================
// F015-F019: Registration
// =============================================================================

/// F015: Adding beyond capacity fails INVALID and leaves the set unchanged
#[test]
fn f015_capacity_is_enforced() {
    let pairs = pairs(5);
    let mut set = DescriptorSet::with_capacity(4);
    for (i, (host, _)) in pairs.iter().take(4).enumerate() {
        set.add(i as u32, Waitable::Fd(host.as_raw_fd())).unwrap();
    }
    let before: Vec<_> = set.iter().copied().collect();

    let err = set.add(9, Waitable::Fd(pairs[4].0.as_raw_fd())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid, "F015 FALSIFIED: wrong code");
    let after: Vec<_> = set.iter().copied().collect();
    assert_eq!(before, after, "F015 FALSIFIED: failed add changed the set");
    assert!(!set.contains(9));
}

/// F016: Duplicate IDs fail INVALID and keep the original waitable
#[test]
fn f016_duplicate_id_rejected() {
    let pairs = pairs(2);
    let mut set = DescriptorSet::new();
    set.add(7, Waitable::Fd(pairs[0].0.as_raw_fd())).unwrap();
    let err = set.add(7, Waitable::Fd(pairs[1].0.as_raw_fd())).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid);
    assert_eq!(
        set.get(7),
        Some(Waitable::Fd(pairs[0].0.as_raw_fd())),
        "F016 FALSIFIED: duplicate replaced the original"
    );
    assert_eq!(set.len(), 1);
}

/// F017: Malformed waitables are rejected
#[test]
fn f017_malformed_waitables_rejected() {
    let mut set = DescriptorSet::new();
    for bad in [Waitable::Fd(-1), Waitable::Handle(0)] {
        let err = set.add(1, bad).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid, "F017 FALSIFIED: accepted {bad}");
    }
    assert!(set.is_empty());
}

/// F018: Waiting forever on an empty set is INVALID
#[test]
fn f018_empty_set_infinite_wait_rejected() {
    let err = DescriptorSet::new().poll(-1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Invalid, "F018 FALSIFIED: empty infinite wait");
}

/// F019: Removed IDs are never reported; removing an absent ID is a no-op
#[test]
fn f019_remove() {
    let pairs = pairs(2);
    let mut set = set_of(&pairs);
    (&pairs[0].1).write_all(b"x").unwrap();
    (&pairs[1].1).write_all(b"x").unwrap();

    assert!(set.remove(100));
    assert!(!set.remove(100));
    assert!(!set.remove(4242));
    assert_eq!(set.poll(0).unwrap(), vec![101], "F019 FALSIFIED: removed id reported");

    set.clear();
    assert!(set.is_empty());
    assert!(set.poll(0).unwrap().is_empty());
}

// =============================================================================
// F020-F025: Readiness
// =============================================================================

/// F020: Every ready ID comes back from one poll
#[test]
fn f020_all_ready_ids_reported_at_once() {
    let pairs = pairs(6);
    let set = set_of(&pairs);
    for i in [0usize, 2, 5] {
        (&pairs[i].1).write_all(b"!").unwrap();
    }
    let mut ready = set.poll(1_000).unwrap();
    ready.sort_unstable();
    assert_eq!(ready, vec![100, 102, 105], "F020 FALSIFIED: readiness split across polls");
}

/// F021: Readiness in any chunk is seen when the set exceeds the primitive limit
///
/// # Falsification Attempt
/// 40 descriptors against a 4-object primitive; make one in the last chunk
/// ready while poll waits indefinitely.
#[test]
fn f021_chunked_poll_finds_any_chunk() {
    let pairs = pairs(40);
    let set = set_of(&pairs);
    let primitive = Bounded::new(4);

    for target in [0usize, 17, 39] {
        (&pairs[target].1).write_all(b"r").unwrap();
        let ready = set.poll_with(&primitive, -1).unwrap();
        assert_eq!(ready, vec![100 + target as u32], "F021 FALSIFIED: missed chunk member");
        let mut sink = [0u8; 1];
        std::io::Read::read(&mut &pairs[target].0, &mut sink).unwrap();
    }
    assert!(primitive.largest_call.load(Ordering::SeqCst) <= 4);
}

/// F022: Chunked poll honours its timeout
#[test]
fn f022_chunked_poll_timeout() {
    let pairs = pairs(20);
    let set = set_of(&pairs);
    let primitive = Bounded::new(4);
    let timing = PollTiming::measure_with(&set, &primitive, 60).unwrap();
    timing
        .check_timed_out()
        .unwrap_or_else(|e| panic!("F022 FALSIFIED: {e}"));
}

/// F023: Readiness arriving during a chunked wait is seen within one slice
#[test]
fn f023_chunked_poll_late_readiness() {
    let pairs = pairs(16);
    let set = set_of(&pairs);
    let writer = pairs[13].1.try_clone().unwrap();
    let primitive = Bounded::new(4);

    let start = Instant::now();
    let thread = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(40));
        (&writer).write_all(b"late").unwrap();
    });
    let ready = set.poll_with(&primitive, 2_000).unwrap();
    thread.join().unwrap();

    assert_eq!(ready, vec![113]);
    assert!(
        start.elapsed() < Duration::from_millis(40 + 10 + POLL_TOLERANCE_MS + 50),
        "F023 FALSIFIED: late readiness took {:?}",
        start.elapsed()
    );
}

/// F024: Hang-up counts as ready
#[test]
fn f024_hangup_is_ready() {
    let mut pairs = pairs(2);
    let set = set_of(&pairs);
    let (_host, peer) = pairs.remove(1);
    drop(peer);
    assert_eq!(set.poll(100).unwrap(), vec![101], "F024 FALSIFIED: hang-up not reported");
}

proptest! {
    /// F025: adjust_timeout keeps negatives infinite and never exceeds the original
    #[test]
    fn f025_adjust_timeout(timeout in -10_000i32..10_000) {
        let left = adjust_timeout(timeout, millis());
        if timeout < 0 {
            prop_assert_eq!(left, -1, "F025 FALSIFIED: negative became finite");
        } else {
            prop_assert!((0..=timeout).contains(&left), "F025 FALSIFIED: {} from {}", left, timeout);
        }
    }
}
