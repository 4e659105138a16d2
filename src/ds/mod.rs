pub mod intrusive_list;
pub mod leak_safe_map;
pub mod slot_arena;

pub use intrusive_list::IntrusiveList;
pub use leak_safe_map::{COPY_THRESHOLD, ConcurrentLeakSafeMap, LeakSafeMap, MAX_DELETION};
pub use slot_arena::{SlotArena, SlotId};
