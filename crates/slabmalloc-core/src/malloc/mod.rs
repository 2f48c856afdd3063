//! Memory allocation.
//!
//! A two-tier allocator:
//! - Small allocations (<= 2048 bytes): power-of-two size classes carved
//!   out of single pages, with a header at the start of each page
//! - Large allocations (> 2048 bytes): dedicated, untracked page mappings

#[allow(unsafe_code)]
pub mod allocator;
pub mod large;
pub mod log;
#[allow(unsafe_code)]
pub mod page;
pub mod size_class;

pub use allocator::{ClassState, MallocState};
pub use large::{LARGE_USABLE_FALLBACK, LargeAllocation};
pub use log::{AllocatorLogLevel, AllocatorLogRecord};
pub use page::{MmapPages, PageSource, SlabPage};
pub use size_class::Route;
