//! Storage for cached payloads and their metadata.
//!
//! The [`Arena`](arena::Arena) owns the pinned bytes and knows only extents;
//! the [`EntryIndex`](index::EntryIndex) maps keys to extents and policy
//! bookkeeping. Neither enforces the other's invariants: the cache core
//! mutates both under one lock.

pub mod arena;
pub mod index;
pub mod key;

pub use arena::Arena;
pub use index::{Entry, EntryIndex, EntryStats};
pub use key::CacheKey;
