#![no_main]

use libfuzzer_sys::fuzz_target;
use expirykit::ds::IntrusiveList;

// Fuzz arbitrary operation sequences on IntrusiveList
//
// Ids are forgotten as soon as their node leaves the list, since the arena
// recycles slots and a stale id may point at a newer node. `live` mirrors
// the list order, most recent first.
fuzz_target!(|data: &[u8]| {
    let mut list: IntrusiveList<u32> = IntrusiveList::with_capacity(16);
    let mut live = Vec::new();

    for chunk in data.chunks_exact(2) {
        let op = chunk[0] % 5;
        let value = u32::from(chunk[1]);

        match op {
            0 => {
                let id = list.push_front(value);
                live.insert(0, id);
                assert_eq!(list.iter().next(), Some(&value));
                assert_eq!(list.get(id), Some(&value));
            }
            1 => {
                let back = list.back().copied();
                assert_eq!(list.pop_back(), back);
                if back.is_some() {
                    live.pop();
                }
            }
            2 => {
                if !live.is_empty() {
                    let id = live.remove(value as usize % live.len());
                    assert!(list.move_to_front(id));
                    live.insert(0, id);
                    assert_eq!(list.iter().next(), list.get(id));
                }
            }
            3 => {
                if !live.is_empty() {
                    let id = live.remove(value as usize % live.len());
                    assert!(list.remove(id).is_some());
                    assert_eq!(list.get(id), None);
                }
            }
            4 => {
                let order: Vec<u32> = live.iter().filter_map(|&id| list.get(id).copied()).collect();
                assert_eq!(list.iter().copied().collect::<Vec<_>>(), order);
            }
            _ => unreachable!(),
        }

        assert_eq!(list.len(), live.len());
        assert_eq!(list.is_empty(), live.is_empty());
        assert!(list.check_invariants().is_ok());
    }
});
