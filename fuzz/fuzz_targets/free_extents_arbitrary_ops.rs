#![no_main]

use libfuzzer_sys::fuzz_target;
use pincache::ds::{Extent, FreeExtents};

// Fuzz arbitrary allocate/free sequences on FreeExtents
//
// Every step checks that free + allocated bytes equal capacity and that no
// two live extents overlap.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let capacity = 64 + usize::from(data[0]) * 4;
    let mut free = FreeExtents::new(capacity);
    let mut live: Vec<Extent> = Vec::new();

    for pair in data[1..].chunks_exact(2) {
        let op = pair[0] % 3;
        let arg = usize::from(pair[1]);

        match op {
            0 | 1 => {
                // allocate
                let len = arg % (capacity / 2 + 1);
                match free.allocate(len) {
                    Some(extent) => {
                        assert_eq!(extent.len(), len);
                        assert!(extent.end() <= capacity);
                        if !extent.is_empty() {
                            live.push(extent);
                        }
                    },
                    None => assert!(free.largest_run() < len),
                }
            },
            _ => {
                // free
                if !live.is_empty() {
                    let extent = live.swap_remove(arg % live.len());
                    free.free(extent);
                }
            },
        }

        let allocated: usize = live.iter().map(Extent::len).sum();
        assert_eq!(free.free_bytes() + allocated, capacity);
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
        free.debug_validate_invariants();
    }
});
