//! pincache: a pinned-memory cache for whole files.
//!
//! Items are read from storage on a miss and copied into a single arena that
//! is locked into RAM, so later hits are served without touching the disk or
//! the page cache. When the arena is full, an eviction policy picks victims:
//! insertion-order [`FifoPolicy`](policy::fifo::FifoPolicy) or the
//! hit-density [`CostAwarePolicy`](policy::cost_aware::CostAwarePolicy).
//!
//! Start at [`FileCache`] or [`CacheBuilder`]. Hosts that want a
//! construct-and-forget handle use [`binding::CacheObject`].

pub mod binding;
pub mod builder;
pub mod cache;
pub mod ds;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod reader;
pub mod store;

pub use crate::builder::{CacheBuilder, CacheConfig};
pub use crate::cache::{FileCache, Outcome};
pub use crate::error::{CacheError, ReadError, Result};
pub use crate::metrics::CacheMetricsSnapshot;
pub use crate::policy::PolicyKind;
pub use crate::reader::{FsReader, MemoryReader, StorageReader};
