//! C ABI for the process-wide allocator.
//!
//! Symbols are prefixed (`slab_*`) so that linking this library never
//! shadows the host libc's `malloc`; a language runtime routes its heap
//! through them explicitly. `realloc` is not offered here: large-object
//! extents are not retained, so a C-level resize cannot know how many
//! bytes to carry over.
//!
//! Every entry point passes through the heap's reentrancy guard. A nested
//! call, or a failure to obtain pages, prints a diagnostic and aborts.

use std::ffi::c_void;

use slabmalloc_core::AllocError;

use crate::heap_state::{GlobalHeap, fatal, or_die};

static HEAP: GlobalHeap = GlobalHeap::new();

/// Allocates at least `size` bytes. Returns null for `size == 0`.
///
/// # Safety
///
/// Single-threaded use only. The result must be released with
/// [`slab_free`], never with the host `free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn slab_malloc(size: usize) -> *mut c_void {
    let mut heap = or_die(HEAP.enter());
    match or_die(heap.malloc(size)) {
        Some(ptr) => ptr.as_ptr().cast(),
        None => std::ptr::null_mut(),
    }
}

/// Allocates `count * size` zeroed bytes.
///
/// Returns null if the product overflows or is zero.
///
/// # Safety
///
/// Same contract as [`slab_malloc`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn slab_calloc(count: usize, size: usize) -> *mut c_void {
    let mut heap = or_die(HEAP.enter());
    match heap.calloc(count, size) {
        Ok(Some(ptr)) => ptr.as_ptr().cast(),
        Ok(None) | Err(AllocError::SizeOverflow { .. }) => std::ptr::null_mut(),
        Err(err) => fatal(err),
    }
}

/// Releases a block obtained from [`slab_malloc`] or [`slab_calloc`].
///
/// Null, large-object and unrecognized pointers are ignored.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn slab_free(ptr: *mut c_void) {
    let mut heap = or_die(HEAP.enter());
    // SAFETY: forwarded caller contract.
    unsafe { heap.free(ptr.cast()) }
}

/// Bytes usable through `ptr`; 0 for null.
///
/// Large objects report a fixed page-size fallback, not their extent.
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn slab_malloc_usable_size(ptr: *mut c_void) -> usize {
    let mut heap = or_die(HEAP.enter());
    // SAFETY: forwarded caller contract.
    unsafe { heap.usable_size(ptr.cast_const().cast()) }
}
