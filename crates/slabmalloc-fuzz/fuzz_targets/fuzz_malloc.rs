#![no_main]
use std::cell::RefCell;
use std::ptr::NonNull;

use libfuzzer_sys::fuzz_target;
use slabmalloc_core::malloc::size_class::{MAX_SMALL_SIZE, bin_index, bin_size};
use slabmalloc_core::{HeapConfig, MallocState};

// Pages are never returned, so one state is shared across inputs and every
// input frees what it allocated. Large requests are left out for the same
// reason: each one maps fresh memory for good.
thread_local! {
    static STATE: RefCell<MallocState> =
        RefCell::new(MallocState::new().with_config(HeapConfig::QUIET));
}

struct Live {
    ptr: NonNull<u8>,
    size: usize,
    tag: u8,
}

fn check(live: &Live) {
    // SAFETY: `size` bytes of a live block.
    let bytes = unsafe { std::slice::from_raw_parts(live.ptr.as_ptr(), live.size) };
    assert!(bytes.iter().all(|&b| b == live.tag), "block {:p} clobbered", live.ptr);
}

fuzz_target!(|data: &[u8]| {
    STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        let mut live: Vec<Live> = Vec::new();

        for chunk in data.chunks_exact(4) {
            let arg = u16::from_le_bytes([chunk[1], chunk[2]]) as usize;
            match chunk[0] % 4 {
                0 => {
                    let size = arg % (MAX_SMALL_SIZE + 1);
                    let Some(ptr) = state.malloc(size).expect("page supply") else {
                        assert_eq!(size, 0);
                        continue;
                    };
                    // SAFETY: pointer just returned by this state.
                    let usable = unsafe { state.usable_size(ptr.as_ptr()) };
                    assert_eq!(usable, bin_size(bin_index(size)));
                    let tag = chunk[3] | 1;
                    // SAFETY: at least `size` writable bytes.
                    unsafe { ptr.as_ptr().write_bytes(tag, size) };
                    live.push(Live { ptr, size, tag });
                }
                1 if !live.is_empty() => {
                    let block = live.swap_remove(arg % live.len());
                    check(&block);
                    // SAFETY: live block, freed once.
                    unsafe { state.free(block.ptr.as_ptr()) };
                }
                2 if !live.is_empty() => {
                    // Free through an interior pointer.
                    let block = live.swap_remove(arg % live.len());
                    check(&block);
                    let offset = usize::from(chunk[3]) % block.size.max(1);
                    // SAFETY: offset stays inside the live block.
                    unsafe { state.free(block.ptr.as_ptr().add(offset)) };
                }
                _ => {
                    if let Some(block) = live.last() {
                        check(block);
                        // SAFETY: live block.
                        let usable = unsafe { state.usable_size(block.ptr.as_ptr()) };
                        assert!(usable >= block.size);
                    }
                }
            }
        }

        for block in live {
            check(&block);
            // SAFETY: live block, freed once.
            unsafe { state.free(block.ptr.as_ptr()) };
        }
    });
});
