//! `GlobalAlloc` adapter for Rust programs.
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOC: slabmalloc_abi::SlabAlloc = slabmalloc_abi::SlabAlloc::new();
//! ```
//!
//! Only sound in single-threaded programs: the adapter has no lock, and a
//! concurrent or nested entry is caught by the heap's in-progress marker
//! and aborts the process.
//!
//! Alignment comes for free from the size classes: a block of `2^k` bytes
//! sits at a multiple of `2^k` within a page-aligned page, so asking for
//! `max(size, align)` bytes is enough. Large regions are page-aligned.
//! Resizing uses the default `GlobalAlloc::realloc`, which copies by the
//! caller's layout size and never consults the large-object fallback.

use std::alloc::{GlobalAlloc, Layout};
use std::ptr;

use slabmalloc_core::malloc::size_class::PAGE_SIZE;

use crate::heap_state::{GlobalHeap, or_die};

pub struct SlabAlloc {
    heap: GlobalHeap,
}

impl SlabAlloc {
    pub const fn new() -> Self {
        Self {
            heap: GlobalHeap::new(),
        }
    }
}

impl Default for SlabAlloc {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for SlabAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > PAGE_SIZE {
            return ptr::null_mut();
        }
        let size = layout.size().max(layout.align());
        let mut heap = or_die(self.heap.enter());
        match or_die(heap.malloc(size)) {
            Some(block) => block.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let mut heap = or_die(self.heap.enter());
        // SAFETY: GlobalAlloc guarantees `ptr` came from `alloc` on self.
        unsafe { heap.free(ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize, align: usize) -> Layout {
        Layout::from_size_align(size, align).unwrap()
    }

    #[test]
    fn alloc_respects_alignment() {
        let alloc = SlabAlloc::new();
        for (size, align) in [(1, 1), (3, 8), (8, 64), (100, 256), (16, 1024), (10, 4096), (5000, 4096)] {
            // SAFETY: non-zero size layouts.
            let ptr = unsafe { alloc.alloc(layout(size, align)) };
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % align, 0, "size {size} align {align}");
        }
    }

    #[test]
    fn over_page_alignment_is_refused() {
        let alloc = SlabAlloc::new();
        // SAFETY: non-zero size layout.
        let ptr = unsafe { alloc.alloc(layout(64, 2 * PAGE_SIZE)) };
        assert!(ptr.is_null());
    }

    #[test]
    fn dealloc_makes_block_reusable() {
        let alloc = SlabAlloc::new();
        let l = layout(40, 8);
        // SAFETY: paired alloc/dealloc on the same allocator.
        unsafe {
            let a = alloc.alloc(l);
            alloc.dealloc(a, l);
            let b = alloc.alloc(l);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn alloc_zeroed_is_zeroed_after_reuse() {
        let alloc = SlabAlloc::new();
        let l = layout(64, 8);
        // SAFETY: 64-byte block written and read within bounds.
        unsafe {
            let a = alloc.alloc(l);
            a.write_bytes(0xEE, 64);
            alloc.dealloc(a, l);
            let b = alloc.alloc_zeroed(l);
            assert_eq!(a, b);
            assert!(std::slice::from_raw_parts(b, 64).iter().all(|&x| x == 0));
        }
    }

    #[test]
    fn realloc_carries_contents_across_classes_and_into_large_path() {
        let alloc = SlabAlloc::new();
        let mut l = layout(24, 8);
        // SAFETY: every access stays within the current layout's size.
        unsafe {
            let mut p = alloc.alloc(l);
            for i in 0..24 {
                *p.add(i) = i as u8;
            }
            for new_size in [100, 2000, 9000, 20_000] {
                p = alloc.realloc(p, l, new_size);
                assert!(!p.is_null());
                l = layout(new_size, 8);
                for i in 0..24 {
                    assert_eq!(*p.add(i), i as u8);
                }
            }
            // Growing out of a large mapping copies by layout size, not by
            // the page-size usable-size fallback.
            p.add(15_000).write(0x42);
            p = alloc.realloc(p, l, 40_000);
            assert_eq!(*p.add(15_000), 0x42);
        }
    }

    #[test]
    fn vec_through_adapter() {
        let alloc = SlabAlloc::new();
        let l = layout(4 * 300, 4);
        // SAFETY: 300 u32 slots in a 1200-byte, 4-aligned region.
        unsafe {
            let p = alloc.alloc(l).cast::<u32>();
            for i in 0..300 {
                p.add(i).write(i as u32 * 3);
            }
            let sum: u32 = (0..300).map(|i| *p.add(i)).sum();
            assert_eq!(sum, 3 * (299 * 300 / 2));
            alloc.dealloc(p.cast(), l);
        }
    }
}
