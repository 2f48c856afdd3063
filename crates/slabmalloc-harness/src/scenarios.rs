//! Named checks of the allocator's observable contract.
//!
//! Each case runs against its own fresh [`MallocState`]; a case passes
//! with a short detail string or fails with a description of the first
//! mismatch it saw.

use std::ptr::{self, NonNull};

use slabmalloc_core::malloc::page::blocks_per_page;
use slabmalloc_core::malloc::size_class::{
    MAX_SMALL_SIZE, MIN_SIZE, NUM_SIZE_CLASSES, PAGE_SIZE, bin_index, bin_size,
};
use slabmalloc_core::malloc::{AllocatorLogRecord, ClassState, LARGE_USABLE_FALLBACK};
use slabmalloc_core::{HeapConfig, MallocState};

use crate::report::{CaseResult, ScenarioReport};

type CaseOutcome = Result<String, String>;

struct Case {
    name: &'static str,
    run: fn(&mut MallocState) -> CaseOutcome,
}

const CASES: &[Case] = &[
    Case {
        name: "floor_size_rounds_up",
        run: floor_size_rounds_up,
    },
    Case {
        name: "usable_size_is_smallest_class",
        run: usable_size_is_smallest_class,
    },
    Case {
        name: "null_and_zero_are_inert",
        run: null_and_zero_are_inert,
    },
    Case {
        name: "free_then_alloc_reuses_block",
        run: free_then_alloc_reuses_block,
    },
    Case {
        name: "usable_size_is_stable",
        run: usable_size_is_stable,
    },
    Case {
        name: "interior_pointer_recovers_block",
        run: interior_pointer_recovers_block,
    },
    Case {
        name: "large_object_fallback_and_noop_free",
        run: large_object_fallback_and_noop_free,
    },
    Case {
        name: "exhaustion_carves_new_page",
        run: exhaustion_carves_new_page,
    },
    Case {
        name: "reference_sizes_10_20_2049",
        run: reference_sizes,
    },
    Case {
        name: "lifo_reuse_is_deterministic",
        run: lifo_reuse_is_deterministic,
    },
    Case {
        name: "calloc_zeroes_reused_block",
        run: calloc_zeroes_reused_block,
    },
];

/// Names of all cases, in run order.
pub fn case_names() -> impl Iterator<Item = &'static str> {
    CASES.iter().map(|case| case.name)
}

/// Runs every case and returns the report plus the lifecycle records
/// each case's allocator retained, in case order.
pub fn run_all(config: HeapConfig) -> (ScenarioReport, Vec<AllocatorLogRecord>) {
    let mut results = Vec::with_capacity(CASES.len());
    let mut logs = Vec::new();
    for case in CASES {
        let mut state = MallocState::new().with_config(config);
        let outcome = (case.run)(&mut state);
        logs.extend(state.drain_lifecycle_logs());
        results.push(match outcome {
            Ok(detail) => CaseResult {
                name: case.name.to_string(),
                passed: true,
                detail,
            },
            Err(detail) => CaseResult {
                name: case.name.to_string(),
                passed: false,
                detail,
            },
        });
    }
    (ScenarioReport::from_cases(results), logs)
}

fn alloc(state: &mut MallocState, size: usize) -> Result<NonNull<u8>, String> {
    match state.malloc(size) {
        Ok(Some(ptr)) => Ok(ptr),
        Ok(None) => Err(format!("malloc({size}) returned null")),
        Err(err) => Err(format!("malloc({size}) failed: {err}")),
    }
}

fn usable(state: &mut MallocState, ptr: *const u8) -> usize {
    // SAFETY: callers pass null or pointers this state handed out.
    unsafe { state.usable_size(ptr) }
}

fn release(state: &mut MallocState, ptr: *mut u8) {
    // SAFETY: callers pass null, large pointers, or live blocks from this state.
    unsafe { state.free(ptr) }
}

fn ensure(cond: bool, detail: impl FnOnce() -> String) -> Result<(), String> {
    if cond { Ok(()) } else { Err(detail()) }
}

fn class_states(state: &MallocState) -> [ClassState; NUM_SIZE_CLASSES] {
    core::array::from_fn(|bin| state.class_state(bin))
}

fn floor_size_rounds_up(state: &mut MallocState) -> CaseOutcome {
    for size in 1..=MIN_SIZE {
        let ptr = alloc(state, size)?;
        let got = usable(state, ptr.as_ptr());
        ensure(got >= MIN_SIZE, || format!("malloc({size}) usable {got} < {MIN_SIZE}"))?;
    }
    Ok(format!("sizes 1..={MIN_SIZE} all report {MIN_SIZE}"))
}

fn usable_size_is_smallest_class(state: &mut MallocState) -> CaseOutcome {
    let mut checked = 0;
    let mut size = 1;
    while size <= MAX_SMALL_SIZE {
        let ptr = alloc(state, size)?;
        let got = usable(state, ptr.as_ptr());
        let expected = bin_size(bin_index(size));
        ensure(got >= size && got == expected, || {
            format!("malloc({size}) usable {got}, expected {expected}")
        })?;
        ensure(got == MIN_SIZE || got / 2 < size, || {
            format!("malloc({size}) usable {got} is not the smallest fitting class")
        })?;
        release(state, ptr.as_ptr());
        checked += 1;
        size += if size < 64 { 1 } else { 7 };
    }
    Ok(format!("{checked} sizes up to {MAX_SMALL_SIZE}"))
}

fn null_and_zero_are_inert(state: &mut MallocState) -> CaseOutcome {
    match state.malloc(0) {
        Ok(None) => {}
        other => return Err(format!("malloc(0) returned {other:?}")),
    }
    ensure(usable(state, ptr::null()) == 0, || "usable_size(null) != 0".into())?;
    let before = class_states(state);
    release(state, ptr::null_mut());
    ensure(class_states(state) == before, || "free(null) changed class state".into())?;
    ensure(state.pages_carved() == 0, || {
        format!("{} pages carved by null/zero calls", state.pages_carved())
    })?;
    Ok("malloc(0) is null, usable_size(null) is 0, free(null) is a no-op".into())
}

fn free_then_alloc_reuses_block(state: &mut MallocState) -> CaseOutcome {
    for bin in 0..NUM_SIZE_CLASSES {
        let size = bin_size(bin);
        let p = alloc(state, size)?;
        let before = usable(state, p.as_ptr());
        release(state, p.as_ptr());
        let q = alloc(state, size)?;
        ensure(p == q, || format!("class {size}: {p:p} freed, got {q:p}"))?;
        let after = usable(state, q.as_ptr());
        ensure(before == after, || format!("class {size}: usable {before} then {after}"))?;
    }
    Ok(format!("all {NUM_SIZE_CLASSES} classes reuse the freed block"))
}

fn usable_size_is_stable(state: &mut MallocState) -> CaseOutcome {
    for size in [1, 24, 300, 2048, 2049, 10_000] {
        let ptr = alloc(state, size)?;
        let first = usable(state, ptr.as_ptr());
        for _ in 0..4 {
            let again = usable(state, ptr.as_ptr());
            ensure(again == first, || format!("malloc({size}): usable {first} then {again}"))?;
        }
    }
    Ok("repeated queries agree".into())
}

fn interior_pointer_recovers_block(state: &mut MallocState) -> CaseOutcome {
    let ptr = alloc(state, 100)?;
    let interior = ptr.as_ptr().wrapping_add(77);
    let got = usable(state, interior);
    ensure(got == 128, || format!("interior usable {got}, expected 128"))?;
    release(state, interior);
    let again = alloc(state, 100)?;
    ensure(again == ptr, || format!("interior free did not return {ptr:p}, got {again:p}"))?;
    Ok("interior pointer maps to its block".into())
}

fn large_object_fallback_and_noop_free(state: &mut MallocState) -> CaseOutcome {
    let size = 3 * PAGE_SIZE + 1;
    let ptr = alloc(state, size)?;
    ensure(ptr.as_ptr() as usize % PAGE_SIZE == 0, || format!("{ptr:p} not page aligned"))?;
    // SAFETY: the mapping covers at least `size` bytes.
    unsafe {
        ptr.as_ptr().write_bytes(0x5A, size);
    }
    let got = usable(state, ptr.as_ptr());
    ensure(got == LARGE_USABLE_FALLBACK, || format!("large usable {got}"))?;
    let before = class_states(state);
    let pages = state.pages_carved();
    release(state, ptr.as_ptr());
    ensure(class_states(state) == before && state.pages_carved() == pages, || {
        "free of a large object changed slab state".into()
    })?;
    // SAFETY: large mappings are never unmapped.
    let intact = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) }
        .iter()
        .all(|&b| b == 0x5A);
    ensure(intact, || "large region contents changed after free".into())?;
    Ok(format!("{size}-byte request reports {LARGE_USABLE_FALLBACK}"))
}

fn exhaustion_carves_new_page(state: &mut MallocState) -> CaseOutcome {
    let mut detail = Vec::new();
    for size in [MIN_SIZE, 256, MAX_SMALL_SIZE] {
        let bin = bin_index(size);
        let per_page = blocks_per_page(size);
        let pages_before = state.pages_carved();
        for _ in 0..per_page {
            alloc(state, size)?;
        }
        ensure(state.class_state(bin) == ClassState::Exhausted, || {
            format!("class {size} not exhausted after {per_page} blocks")
        })?;
        let first_page = state.current_page(bin).map(|page| page.base());
        alloc(state, size)?;
        let second_page = state.current_page(bin);
        ensure(state.pages_carved() == pages_before + 2, || {
            format!("class {size}: {} pages carved", state.pages_carved() - pages_before)
        })?;
        ensure(second_page.and_then(|page| page.previous()).map(|p| p.base()) == first_page, || {
            format!("class {size}: new page does not link the exhausted one")
        })?;
        detail.push(format!("{size}x{per_page}"));
    }
    Ok(format!("carved a second page after {}", detail.join(", ")))
}

fn reference_sizes(state: &mut MallocState) -> CaseOutcome {
    for (size, expected) in [(10, 16), (20, 32), (2049, LARGE_USABLE_FALLBACK)] {
        let ptr = alloc(state, size)?;
        let got = usable(state, ptr.as_ptr());
        ensure(got == expected, || format!("malloc({size}) usable {got}, expected {expected}"))?;
    }
    Ok("10 -> 16, 20 -> 32, 2049 -> page fallback".into())
}

fn lifo_reuse_is_deterministic(state: &mut MallocState) -> CaseOutcome {
    let blocks = [alloc(state, 48)?, alloc(state, 48)?, alloc(state, 48)?];
    for block in blocks {
        release(state, block.as_ptr());
    }
    for expected in blocks.iter().rev() {
        let got = alloc(state, 48)?;
        ensure(got == *expected, || format!("expected {expected:p}, got {got:p}"))?;
    }
    Ok("freed blocks come back most-recent first".into())
}

fn calloc_zeroes_reused_block(state: &mut MallocState) -> CaseOutcome {
    let dirty = alloc(state, 64)?;
    // SAFETY: 64-byte block.
    unsafe { dirty.as_ptr().write_bytes(0xFF, 64) };
    release(state, dirty.as_ptr());
    let zeroed = match state.calloc(8, 8) {
        Ok(Some(ptr)) => ptr,
        other => return Err(format!("calloc(8, 8) returned {other:?}")),
    };
    ensure(zeroed == dirty, || "calloc did not reuse the freed block".into())?;
    // SAFETY: 64-byte block.
    let bytes = unsafe { std::slice::from_raw_parts(zeroed.as_ptr(), 64) };
    ensure(bytes.iter().all(|&b| b == 0), || "calloc block not zeroed".into())?;
    ensure(state.calloc(usize::MAX, 2).is_err(), || "calloc overflow not reported".into())?;
    Ok("calloc clears a dirty recycled block".into())
}
