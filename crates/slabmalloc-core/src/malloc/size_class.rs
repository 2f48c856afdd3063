//! Size class routing for small allocations.
//!
//! Small requests are rounded up to a power of two between [`MIN_SIZE`]
//! and [`MAX_SMALL_SIZE`]; the bin index is the base-2 logarithm of that
//! power relative to the floor. Anything above [`MAX_SMALL_SIZE`] is
//! mapped directly from the operating system.

/// Size of one operating-system page, and the unit the slab path carves.
pub const PAGE_SIZE: usize = 0x1000;

/// Minimum allocation size (bytes). Smaller requests are promoted.
pub const MIN_SIZE: usize = 16;

/// Maximum size for small allocations (bytes). Above this, use the large path.
pub const MAX_SMALL_SIZE: usize = 2048;

/// Number of size class bins: 16, 32, 64, ..., 2048.
pub const NUM_SIZE_CLASSES: usize = 8;

const MIN_SHIFT: u32 = MIN_SIZE.trailing_zeros();

/// How a request of a given size is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Zero-byte request: no allocation, no error.
    Empty,
    /// Slab path, carrying the bin index.
    Small(usize),
    /// Large path, carrying the page-rounded mapping length.
    Large(usize),
}

/// Decides which path serves a request of `size` bytes.
pub fn route(size: usize) -> Route {
    if size == 0 {
        return Route::Empty;
    }
    if size > MAX_SMALL_SIZE {
        return match page_align(size) {
            Some(len) => Route::Large(len),
            // Page rounding overflowed; saturate so the mapping fails cleanly.
            None => Route::Large(usize::MAX & !(PAGE_SIZE - 1)),
        };
    }
    Route::Small(bin_index(size))
}

/// Computes the bin index for a small allocation size.
///
/// Sizes above `MAX_SMALL_SIZE` return `NUM_SIZE_CLASSES` to signal the
/// large-allocation path.
pub fn bin_index(size: usize) -> usize {
    let size = size.max(MIN_SIZE);
    if size > MAX_SMALL_SIZE {
        return NUM_SIZE_CLASSES;
    }
    let rounded = round_up_pow2(size);
    (rounded.trailing_zeros() - MIN_SHIFT) as usize
}

/// Returns the block size for a given bin index, or 0 when out of range.
pub fn bin_size(index: usize) -> usize {
    if index < NUM_SIZE_CLASSES {
        MIN_SIZE << index
    } else {
        0
    }
}

/// True when `n` is exactly one of the managed block sizes.
pub fn is_class_size(n: usize) -> bool {
    n.is_power_of_two() && (MIN_SIZE..=MAX_SMALL_SIZE).contains(&n)
}

/// Rounds `n` up to the next power of two. Exact powers map to themselves.
#[inline]
pub fn round_up_pow2(n: usize) -> usize {
    n.next_power_of_two()
}

/// Rounds `size` up to a whole number of pages, `None` on overflow.
#[inline]
pub fn page_align(size: usize) -> Option<usize> {
    size.checked_add(PAGE_SIZE - 1).map(|v| v & !(PAGE_SIZE - 1))
}
