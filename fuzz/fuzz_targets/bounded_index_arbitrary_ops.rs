#![no_main]

use libfuzzer_sys::fuzz_target;
use expirykit::policy::lru::{BoundedIndex, RecencyIndex};

// Fuzz add/remove sequences on BoundedIndex against a Vec recency model
// (most recent first). Every eviction must report exactly the model's
// least recently used key.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let limit = usize::from(data[0] % 16) + 1;
    let mut index = BoundedIndex::new(limit);
    let mut model: Vec<u8> = Vec::new();

    for chunk in data[1..].chunks_exact(2) {
        let key = chunk[1] % 24;
        let mut evicted = Vec::new();

        if chunk[0] % 3 == 0 {
            index.remove(&key, &mut |k| evicted.push(k));
            let expected: Vec<u8> = model.iter().copied().filter(|&k| k == key).collect();
            model.retain(|&k| k != key);
            assert_eq!(evicted, expected);
        } else {
            index.add(key, &mut |k| evicted.push(k));
            model.retain(|&k| k != key);
            model.insert(0, key);
            let expected = if model.len() > limit { model.pop() } else { None };
            assert_eq!(evicted, expected.into_iter().collect::<Vec<_>>());
        }

        assert_eq!(index.len(), model.len());
        assert!(index.iter().copied().eq(model.iter().copied()));
        assert!(index.check_invariants().is_ok());
    }
});
