// ==============================================
// CACHE BEHAVIOR TESTS (integration)
// ==============================================
//
// End-to-end properties of FileCache driven through the public API against
// an in-memory storage reader.

use std::sync::Arc;

use pincache::builder::CacheConfig;
use pincache::cache::{FileCache, Outcome};
use pincache::error::CacheError;
use pincache::policy::PolicyKind;
use pincache::reader::MemoryReader;

fn blob(tag: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| tag.wrapping_add(i as u8)).collect()
}

fn open(reader: &Arc<MemoryReader>, capacity: usize, policy: PolicyKind) -> FileCache {
    FileCache::open(CacheConfig::new(capacity, policy), Arc::clone(reader)).unwrap()
}

// ==============================================
// Hit Correctness
// ==============================================

mod hit_correctness {
    use super::*;

    #[test]
    fn hit_returns_admitted_bytes_exactly() {
        let reader = Arc::new(MemoryReader::new());
        let payload = blob(17, 300);
        reader.insert("img/a.bmp", payload.clone());
        let cache = open(&reader, 1024, PolicyKind::CostAware);

        let mut buf = vec![0xAAu8; 512];
        assert_eq!(cache.get("img/a.bmp", &mut buf).unwrap(), (300, Outcome::Miss));

        // Storage changes after admission; the resident copy does not.
        reader.insert("img/a.bmp", blob(99, 300));
        let mut again = vec![0u8; 300];
        assert_eq!(cache.get("img/a.bmp", &mut again).unwrap(), (300, Outcome::Hit));
        assert_eq!(again, payload);
        assert_eq!(&buf[..300], &payload[..]);
        assert!(buf[300..].iter().all(|&b| b == 0xAA), "bytes past the item were touched");
    }

    #[test]
    fn buffer_exactly_item_size_is_enough() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert("k", blob(1, 64));
        let cache = open(&reader, 256, PolicyKind::Fifo);

        let mut buf = [0u8; 64];
        assert_eq!(cache.get("k", &mut buf).unwrap().0, 64);
        assert_eq!(cache.get("k", &mut buf).unwrap().1, Outcome::Hit);
    }

    #[test]
    fn zero_length_item_is_cached() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert("empty", Vec::<u8>::new());
        let cache = open(&reader, 16, PolicyKind::CostAware);

        let mut buf = [0u8; 0];
        assert_eq!(cache.get("empty", &mut buf).unwrap(), (0, Outcome::Miss));
        assert_eq!(cache.get("empty", &mut buf).unwrap(), (0, Outcome::Hit));
        assert_eq!(reader.reads(), 1);
    }
}

// ==============================================
// Size Rejection
// ==============================================

mod size_rejection {
    use super::*;

    #[test]
    fn miss_larger_than_buffer_writes_nothing() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert("k", blob(5, 100));
        let cache = open(&reader, 1024, PolicyKind::CostAware);

        let mut buf = [0u8; 99];
        let err = cache.get("k", &mut buf).unwrap_err();
        assert!(matches!(err, CacheError::ItemTooLarge { size: 100, capacity: 99 }));
        assert!(buf.iter().all(|&b| b == 0));
        assert!(!cache.contains("k").unwrap(), "oversized miss must not be admitted");
    }

    #[test]
    fn hit_larger_than_buffer_writes_nothing() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert("k", blob(5, 100));
        let cache = open(&reader, 1024, PolicyKind::Fifo);
        cache.get_owned("k", 100).unwrap();

        let mut buf = [0u8; 10];
        let err = cache.get("k", &mut buf).unwrap_err();
        assert!(matches!(err, CacheError::BufferTooSmall { size: 100, capacity: 10 }));
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(cache.metrics().unwrap().hits, 0);
    }
}

// ==============================================
// Uncacheable-but-Readable
// ==============================================

mod uncacheable {
    use super::*;

    #[test]
    fn item_over_capacity_is_served_but_never_indexed() {
        let reader = Arc::new(MemoryReader::new());
        let payload = blob(3, 2048);
        reader.insert("huge", payload.clone());
        reader.insert("small", blob(4, 16));
        let cache = open(&reader, 1024, PolicyKind::CostAware);
        cache.get_owned("small", 16).unwrap();

        for _ in 0..3 {
            let (bytes, outcome) = cache.get_owned("huge", 4096).unwrap();
            assert_eq!(bytes, payload);
            assert_eq!(outcome, Outcome::Miss);
            assert!(!cache.contains("huge").unwrap());
        }
        assert!(cache.contains("small").unwrap(), "uncacheable item evicted a resident");
        assert_eq!(reader.reads_of("huge"), 3);
    }
}

// ==============================================
// Eviction Order
// ==============================================

mod eviction_order {
    use super::*;

    #[test]
    fn fifo_evicts_first_of_three() {
        let reader = Arc::new(MemoryReader::new());
        for (key, tag) in [("A", 1), ("B", 2), ("C", 3)] {
            reader.insert(key, blob(tag, 50));
        }
        let cache = open(&reader, 100, PolicyKind::Fifo);

        for key in ["A", "B", "C"] {
            cache.get_owned(key, 50).unwrap();
        }
        assert!(!cache.contains("A").unwrap());
        assert!(cache.contains("B").unwrap());
        assert!(cache.contains("C").unwrap());
        assert_eq!(cache.metrics().unwrap().evictions, 1);
    }

    #[test]
    fn fifo_ignores_hits() {
        let reader = Arc::new(MemoryReader::new());
        for (key, tag) in [("A", 1), ("B", 2), ("C", 3)] {
            reader.insert(key, blob(tag, 50));
        }
        let cache = open(&reader, 100, PolicyKind::Fifo);

        cache.get_owned("A", 50).unwrap();
        cache.get_owned("B", 50).unwrap();
        for _ in 0..10 {
            assert_eq!(cache.get_owned("A", 50).unwrap().1, Outcome::Hit);
        }
        cache.get_owned("C", 50).unwrap();
        assert!(!cache.contains("A").unwrap());
    }

    #[test]
    fn cost_aware_keeps_dense_small_item_over_older_large_one() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert("large", blob(1, 90));
        reader.insert("small", blob(2, 5));
        reader.insert("third", blob(3, 10));
        let cache = open(&reader, 100, PolicyKind::CostAware);

        cache.get_owned("large", 100).unwrap();
        cache.get_owned("small", 100).unwrap();
        for _ in 0..10 {
            assert_eq!(cache.get_owned("small", 100).unwrap().1, Outcome::Hit);
        }

        cache.get_owned("third", 100).unwrap();
        assert!(!cache.contains("large").unwrap(), "large low-density item should go first");
        assert!(cache.contains("small").unwrap());
        assert!(cache.contains("third").unwrap());
        assert_eq!(cache.entry_stats("small").unwrap().unwrap().hits, 11);
    }

    #[test]
    fn cost_aware_evicts_only_what_is_needed() {
        let reader = Arc::new(MemoryReader::new());
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            reader.insert(key, blob(i as u8, 25));
        }
        reader.insert("e", blob(9, 20));
        let cache = open(&reader, 100, PolicyKind::CostAware);

        for key in ["a", "b", "c", "d"] {
            cache.get_owned(key, 25).unwrap();
        }
        cache.get_owned("e", 25).unwrap();
        assert_eq!(cache.len().unwrap(), 4);
        assert_eq!(cache.metrics().unwrap().evictions, 1);
        assert!(!cache.contains("a").unwrap(), "equal density ties go to the oldest");
    }
}

// ==============================================
// Lifecycle
// ==============================================

mod lifecycle {
    use super::*;

    #[test]
    fn destroy_once_then_everything_fails() {
        let reader = Arc::new(MemoryReader::new());
        reader.insert("k", blob(1, 8));
        let cache = open(&reader, 64, PolicyKind::Fifo);
        cache.get_owned("k", 8).unwrap();

        cache.destroy().unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(cache.get("k", &mut buf), Err(CacheError::NotInitialized)));
        assert!(matches!(cache.contains("k"), Err(CacheError::NotInitialized)));
        assert!(matches!(cache.metrics(), Err(CacheError::NotInitialized)));
        assert!(matches!(cache.destroy(), Err(CacheError::NotInitialized)));
        assert!(!cache.is_ready());
    }

    #[test]
    fn open_reports_out_of_memory_for_unmappable_capacity() {
        let capacity = usize::MAX / 2;
        let err = FileCache::open(CacheConfig::new(capacity, PolicyKind::Fifo), MemoryReader::new()).unwrap_err();
        match err {
            CacheError::OutOfMemory { capacity: requested, .. } => assert_eq!(requested, capacity),
            other => panic!("expected OutOfMemory, got {other:?}"),
        }
    }
}

// ==============================================
// Arena/Index Consistency (property)
// ==============================================

mod consistency {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Get(usize),
        Invalidate(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            8 => (0usize..12).prop_map(Op::Get),
            1 => (0usize..12).prop_map(Op::Invalidate),
        ]
    }

    fn policy() -> impl Strategy<Value = PolicyKind> {
        prop_oneof![Just(PolicyKind::Fifo), Just(PolicyKind::CostAware)]
    }

    proptest! {
        #[test]
        fn used_matches_residents_after_every_call(
            sizes in prop::collection::vec(0usize..96, 12),
            ops in prop::collection::vec(op(), 1..120),
            policy in policy(),
        ) {
            let reader = Arc::new(MemoryReader::new());
            let keys: Vec<String> = (0..sizes.len()).map(|i| format!("file-{i}.bin")).collect();
            for (i, (key, &size)) in keys.iter().zip(&sizes).enumerate() {
                reader.insert(key.as_str(), blob(i as u8, size));
            }
            let cache = open(&reader, 256, policy);

            for op in ops {
                match op {
                    Op::Get(i) => {
                        let (bytes, _) = cache.get_owned(&keys[i], 128).unwrap();
                        prop_assert_eq!(bytes, blob(i as u8, sizes[i]));
                    }
                    Op::Invalidate(i) => {
                        cache.invalidate(&keys[i]).unwrap();
                    }
                }

                let resident: usize = keys
                    .iter()
                    .filter_map(|k| cache.entry_stats(k).unwrap())
                    .map(|stats| stats.size)
                    .sum();
                let used = cache.used().unwrap();
                prop_assert_eq!(used, resident);
                prop_assert!(used <= cache.capacity().unwrap());
                prop_assert!(cache.check_invariants().unwrap().is_ok());
            }
        }
    }
}
