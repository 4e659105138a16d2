#![no_main]

use std::collections::HashMap;

use libfuzzer_sys::fuzz_target;
use expirykit::ds::LeakSafeMap;

// Fuzz arbitrary put/remove/get sequences on LeakSafeMap against a HashMap
// model, with tiny thresholds so generations are folded constantly.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let max_deletion = usize::from(data[0] % 8) + 1;
    let copy_threshold = usize::from(data[1] % 16);
    let mut map = LeakSafeMap::with_thresholds(max_deletion, copy_threshold);
    let mut model: HashMap<u8, u16> = HashMap::new();

    for chunk in data[2..].chunks_exact(3) {
        let key = chunk[1] % 32;
        let value = u16::from_le_bytes([chunk[1], chunk[2]]);

        match chunk[0] % 4 {
            0 => {
                assert_eq!(map.put(key, value), model.insert(key, value));
            }
            1 => {
                assert_eq!(map.remove(&key), model.remove(&key));
            }
            2 => {
                assert_eq!(map.get(&key), model.get(&key));
                assert_eq!(map.contains_key(&key), model.contains_key(&key));
            }
            3 => {
                let mut seen = 0;
                map.range(|k, v| {
                    assert_eq!(model.get(k), Some(v));
                    seen += 1;
                    true
                });
                assert_eq!(seen, model.len());
            }
            _ => unreachable!(),
        }

        assert_eq!(map.len(), model.len());
        assert!(map.check_invariants().is_ok());
    }
});
