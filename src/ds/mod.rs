pub mod free_extents;
pub mod pinned;

pub use free_extents::{Extent, FreeExtents};
pub use pinned::PinnedRegion;
