//! Common imports.
//!
//! ```
//! use pincache::prelude::*;
//!
//! let cache = CacheBuilder::new(1024)
//!     .policy(PolicyKind::Fifo)
//!     .build(MemoryReader::new())
//!     .unwrap();
//! assert_eq!(cache.capacity().unwrap(), 1024);
//! ```

pub use crate::binding::CacheObject;
pub use crate::builder::{CacheBuilder, CacheConfig};
pub use crate::cache::{FileCache, Outcome};
pub use crate::error::{CacheError, ReadError};
pub use crate::metrics::CacheMetricsSnapshot;
pub use crate::policy::{EvictionPolicy, PolicyKind};
pub use crate::reader::{FsReader, MemoryReader, StorageReader};
pub use crate::store::EntryStats;
