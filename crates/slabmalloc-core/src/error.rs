//! Allocator error taxonomy.
//!
//! Zero-size requests and unrecognized pointers are not errors; they are
//! absorbed as `Ok(None)` or no-ops. Everything here is unrecoverable
//! for the process-wide allocator and is turned into a diagnostic plus
//! termination at the ABI boundary.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The operating system refused to map fresh pages.
    #[error("mmap of {len} bytes failed (errno {errno})")]
    PageMapFailed { len: usize, errno: i32 },
    /// The allocator was entered while an operation was still in progress.
    #[error("nested call to the allocator")]
    Reentrant,
    /// `count * size` does not fit in `usize`.
    #[error("allocation size overflow ({count} x {size})")]
    SizeOverflow { count: usize, size: usize },
}

impl AllocError {
    /// True for conditions that must halt the process when hit inside the
    /// process allocator.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::SizeOverflow { .. })
    }
}
