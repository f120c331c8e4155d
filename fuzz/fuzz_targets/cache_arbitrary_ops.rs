#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use pincache::builder::CacheConfig;
use pincache::cache::FileCache;
use pincache::policy::PolicyKind;
use pincache::reader::MemoryReader;

const KEYS: usize = 16;

// Fuzz arbitrary get/invalidate sequences through FileCache
//
// Item sizes come from the input; every get must return the stored bytes and
// leave the arena and index consistent.
fuzz_target!(|data: &[u8]| {
    if data.len() < KEYS + 1 {
        return;
    }

    let policy = if data[0] & 1 == 0 { PolicyKind::Fifo } else { PolicyKind::CostAware };
    let reader = Arc::new(MemoryReader::new());
    let sizes: Vec<usize> = data[1..=KEYS].iter().map(|&b| usize::from(b)).collect();
    for (i, &size) in sizes.iter().enumerate() {
        reader.insert(format!("k{i}"), vec![i as u8; size]);
    }
    let Ok(cache) = FileCache::open(CacheConfig::new(512, policy), Arc::clone(&reader)) else {
        return;
    };

    for &byte in &data[KEYS + 1..] {
        let i = usize::from(byte) % KEYS;
        let key = format!("k{i}");
        if byte & 0x80 == 0 {
            let (bytes, _) = cache.get_owned(&key, 256).unwrap();
            assert_eq!(bytes.len(), sizes[i]);
            assert!(bytes.iter().all(|&b| b == i as u8));
        } else {
            cache.invalidate(&key).unwrap();
        }
        assert!(cache.used().unwrap() <= 512);
        cache.check_invariants().unwrap().unwrap();
    }
});
