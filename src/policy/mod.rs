pub mod lru;

pub use lru::{BoundedIndex, RecencyIndex, UnboundedIndex};
