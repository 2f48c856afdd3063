//! Large allocation handling (> `MAX_SMALL_SIZE`).
//!
//! Large requests get a dedicated page-rounded mapping with no header.
//! They are not tracked: freeing one is a no-op and its usable size is
//! reported as [`LARGE_USABLE_FALLBACK`], not the mapped extent.

use core::ptr::NonNull;

use super::page::PageSource;
use super::size_class::{self, PAGE_SIZE};
use crate::error::AllocError;

/// Usable size reported for any pointer not inside a slab page.
pub const LARGE_USABLE_FALLBACK: usize = PAGE_SIZE;

/// A freshly mapped large allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargeAllocation {
    /// Start of the mapping, handed to the caller as-is.
    pub base: NonNull<u8>,
    /// Total size of the mapped region.
    pub mapped_size: usize,
    /// Size requested by the caller.
    pub user_size: usize,
}

/// Maps a dedicated region for a `user_size`-byte request.
pub fn alloc<S: PageSource>(source: &mut S, user_size: usize) -> Result<LargeAllocation, AllocError> {
    let mapped_size = size_class::page_align(user_size).ok_or(AllocError::PageMapFailed {
        len: user_size,
        errno: libc::ENOMEM,
    })?;
    let base = source.map(mapped_size)?;
    Ok(LargeAllocation {
        base,
        mapped_size,
        user_size,
    })
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::malloc::page::MmapPages;

    #[test]
    fn test_large_alloc_is_page_rounded() {
        let alloc = alloc(&mut MmapPages, 65_537).unwrap();
        assert_eq!(alloc.user_size, 65_537);
        assert_eq!(alloc.mapped_size, 65_536 + PAGE_SIZE);
        assert_eq!(alloc.base.as_ptr() as usize % PAGE_SIZE, 0);
    }

    #[test]
    fn test_large_alloc_whole_region_writable() {
        let alloc = alloc(&mut MmapPages, 3 * PAGE_SIZE).unwrap();
        // SAFETY: the mapping is mapped_size RW bytes.
        let bytes = unsafe { core::slice::from_raw_parts_mut(alloc.base.as_ptr(), alloc.mapped_size) };
        assert!(bytes.iter().all(|&b| b == 0));
        bytes[alloc.mapped_size - 1] = 0xAB;
        assert_eq!(bytes[alloc.mapped_size - 1], 0xAB);
    }

    #[test]
    fn test_large_alloc_overflowing_size() {
        let err = alloc(&mut MmapPages, usize::MAX).unwrap_err();
        assert!(matches!(err, AllocError::PageMapFailed { .. }));
    }
}
