//! Property-based tests for the keystone primitives.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use keystone::framing::{Framer, IncrementalFramer, JsonScanner, RingFramer};
use keystone::Pool;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

/// Strategy for one JSON leaf (no interior whitespace).
fn json_leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        "[a-z]{0,8}".prop_map(|s| format!("\"{}\"", s)),
        Just("true".to_string()),
        Just("false".to_string()),
        Just("null".to_string()),
    ]
}

/// Strategy for a nested JSON fragment built from leaves.
fn json_fragment() -> impl Strategy<Value = String> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|items| format!("[{}]", items.join(","))),
            prop::collection::vec(("[a-z]{1,5}", inner), 0..4).prop_map(|fields| {
                let body: Vec<String> = fields
                    .into_iter()
                    .map(|(key, value)| format!("\"{}\":{}", key, value))
                    .collect();
                format!("{{{}}}", body.join(","))
            }),
        ]
    })
}

/// Strategy for a complete top-level value: always an object or array.
fn top_level_value() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::collection::vec(json_fragment(), 0..4)
            .prop_map(|items| format!("[{}]", items.join(","))),
        prop::collection::vec(("[a-z]{1,5}", json_fragment()), 0..4).prop_map(|fields| {
            let body: Vec<String> = fields
                .into_iter()
                .map(|(key, value)| format!("\"{}\":{}", key, value))
                .collect();
            format!("{{{}}}", body.join(","))
        }),
    ]
}

/// Strategy for inter-value whitespace runs.
fn whitespace() -> impl Strategy<Value = String> {
    prop::collection::vec(prop_oneof![Just(' '), Just('\n'), Just('\t'), Just('\r')], 0..4)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Concatenate values with whitespace between them, then split the stream
/// into pushes whose lengths cycle through `chunk_sizes`.
fn build_stream(values: &[String], gaps: &[String]) -> Vec<u8> {
    let mut stream = Vec::new();
    for (i, value) in values.iter().enumerate() {
        stream.extend_from_slice(gaps[i % gaps.len()].as_bytes());
        stream.extend_from_slice(value.as_bytes());
    }
    stream.extend_from_slice(gaps[0].as_bytes());
    stream
}

fn push_in_chunks(framer: &mut dyn Framer, stream: &[u8], chunk_sizes: &[usize]) {
    let mut offset = 0;
    let mut turn = 0;
    while offset < stream.len() {
        let len = chunk_sizes[turn % chunk_sizes.len()].clamp(1, stream.len() - offset);
        framer.push(&stream[offset..offset + len]);
        offset += len;
        turn += 1;
    }
}

fn collecting_callback() -> (Arc<Mutex<Vec<String>>>, Box<dyn FnMut(&[u8]) + Send>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = Box::new(move |bytes: &[u8]| {
        sink.lock()
            .unwrap()
            .push(String::from_utf8(bytes.to_vec()).unwrap());
    });
    (seen, callback)
}

proptest! {
    /// The scanner never reports completion without having started, and
    /// completion always coincides with both depths at zero.
    #[test]
    fn scanner_completion_is_consistent(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut scanner = JsonScanner::new();
        for byte in bytes {
            let done = scanner.feed(byte);
            if done {
                prop_assert!(scanner.is_started());
                prop_assert!(scanner.is_complete());
                scanner.reset();
                prop_assert!(!scanner.is_started());
            }
        }
    }

    /// Feeding a well-formed top-level value byte by byte completes on
    /// exactly the last byte.
    #[test]
    fn scanner_frames_generated_values(value in top_level_value()) {
        // Empty objects/arrays are still two bytes, so every generated
        // value has a last byte.
        let bytes = value.as_bytes();
        let mut scanner = JsonScanner::new();
        for (i, &byte) in bytes.iter().enumerate() {
            let done = scanner.feed(byte);
            prop_assert_eq!(done, i == bytes.len() - 1, "value {:?} byte {}", &value, i);
        }
    }

    /// Incremental framer round trip: a concatenation of top-level values
    /// with arbitrary whitespace between them is emitted as exactly the
    /// original value list, regardless of push boundaries.
    #[test]
    fn incremental_round_trip(
        values in prop::collection::vec(top_level_value(), 1..5),
        gaps in prop::collection::vec(whitespace(), 1..4),
        chunk_sizes in prop::collection::vec(1usize..16, 1..4),
    ) {
        let (seen, callback) = collecting_callback();
        let mut framer = IncrementalFramer::new(callback, None);

        let stream = build_stream(&values, &gaps);
        push_in_chunks(&mut framer, &stream, &chunk_sizes);

        prop_assert_eq!(&*seen.lock().unwrap(), &values);
    }

    /// Ring framer round trip, with a deliberately tiny initial ring so
    /// growth happens constantly. After any growth the logical byte
    /// sequence is unchanged, which the round trip verifies end to end.
    #[test]
    fn ring_round_trip(
        values in prop::collection::vec(top_level_value(), 1..5),
        gaps in prop::collection::vec(whitespace(), 1..4),
        chunk_sizes in prop::collection::vec(1usize..16, 1..4),
    ) {
        let (seen, callback) = collecting_callback();
        let mut framer = RingFramer::new(callback, None, 4);

        let stream = build_stream(&values, &gaps);
        push_in_chunks(&mut framer, &stream, &chunk_sizes);

        prop_assert_eq!(&*seen.lock().unwrap(), &values);
    }

    /// Pool accounting: free + allocated == total after every operation.
    #[test]
    fn pool_accounting_holds(ops in prop::collection::vec(any::<bool>(), 1..200)) {
        let pool = Pool::<u64>::new(16, 0).unwrap();
        let mut live = Vec::new();

        for (i, op) in ops.into_iter().enumerate() {
            if op {
                live.push(pool.construct(i as u64).unwrap());
            } else if let Some(ptr) = live.pop() {
                unsafe { pool.destroy(ptr) };
            }
            prop_assert_eq!(
                pool.free_count() + pool.allocated_count(),
                pool.total_count()
            );
            prop_assert!(live.iter().all(|ptr| pool.validate_pointer(ptr.as_ptr())));
        }

        for ptr in live {
            unsafe { pool.destroy(ptr) };
        }
        prop_assert_eq!(pool.allocated_count(), 0);
    }
}

#[cfg(test)]
mod stress_tests {
    use super::*;
    use std::thread;

    /// Four threads hammering one pool with interleaved reallocation.
    /// Everything is destroyed at the end, so the pool must report zero
    /// allocations and pass the leak check.
    #[test]
    fn stress_pool_multithreaded() {
        const NUM_THREADS: usize = 4;
        const ITEMS_PER_THREAD: usize = 10_000;
        const CHUNK_BLOCKS: usize = 1_000;

        let pool = Arc::new(Pool::<u64>::new(CHUNK_BLOCKS, 0).unwrap());

        let handles: Vec<_> = (0..NUM_THREADS)
            .map(|thread_id| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut items = Vec::with_capacity(ITEMS_PER_THREAD);
                    for i in 0..ITEMS_PER_THREAD {
                        let value = (thread_id * ITEMS_PER_THREAD + i) as u64;
                        items.push(Some(pool.construct(value).unwrap()));
                    }

                    // Destroy every other item, then reallocate the holes.
                    for slot in items.iter_mut().step_by(2) {
                        if let Some(ptr) = slot.take() {
                            unsafe { pool.destroy(ptr) };
                        }
                    }
                    for (i, slot) in items.iter_mut().enumerate().step_by(2) {
                        *slot = Some(pool.construct(i as u64).unwrap());
                    }

                    for slot in items.into_iter().flatten() {
                        unsafe { pool.destroy(slot) };
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.allocated_count(), 0);
        assert!(pool.total_count() >= NUM_THREADS * ITEMS_PER_THREAD / CHUNK_BLOCKS);
        assert_eq!(
            pool.free_count() + pool.allocated_count(),
            pool.total_count()
        );
        pool.check_leaks().unwrap();
    }

    /// Repeated full allocate/release cycles must keep reusing the same
    /// blocks instead of growing without bound.
    #[test]
    fn stress_pool_reuse() {
        const OBJECTS: usize = 1_000;

        let pool = Pool::<u64>::new(OBJECTS / 10, 0).unwrap();
        let mut high_water = 0;

        for round in 0..100 {
            let mut items = Vec::with_capacity(OBJECTS);
            for i in 0..OBJECTS {
                items.push(pool.construct((round * OBJECTS + i) as u64).unwrap());
            }
            for ptr in items {
                unsafe { pool.destroy(ptr) };
            }
            assert_eq!(pool.allocated_count(), 0);

            if round == 0 {
                high_water = pool.total_count();
            } else {
                assert_eq!(pool.total_count(), high_water);
            }
        }
    }

    /// One pool shared by threads that allocate concurrently and record
    /// every address: no block may be issued to two owners at once.
    #[test]
    fn stress_pool_exclusivity() {
        const NUM_THREADS: usize = 4;
        const ITEMS_PER_THREAD: usize = 2_000;

        let pool = Arc::new(Pool::<u64>::new(128, 0).unwrap());

        let handles: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut addrs = Vec::with_capacity(ITEMS_PER_THREAD);
                    for i in 0..ITEMS_PER_THREAD {
                        let ptr = pool.construct(i as u64).unwrap();
                        addrs.push(ptr.as_ptr() as usize);
                    }
                    addrs
                })
            })
            .collect();

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let issued = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), issued, "a block was issued to two owners");

        // The test leaks on purpose up to here; return every block so the
        // pool tears down clean.
        for addr in all {
            unsafe { pool.destroy(std::ptr::NonNull::new(addr as *mut u64).unwrap()) };
        }
        assert_eq!(pool.allocated_count(), 0);
    }
}
