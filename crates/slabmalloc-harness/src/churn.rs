//! Seeded allocate/free storm.
//!
//! Every live block is filled with a byte pattern unique to its
//! allocation and checked when it is released, so a free-list bug that
//! hands the same bytes to two owners shows up as a corrupted block.

use std::ptr::NonNull;

use slabmalloc_core::malloc::size_class::MAX_SMALL_SIZE;
use slabmalloc_core::malloc::{AllocatorLogRecord, LARGE_USABLE_FALLBACK};
use slabmalloc_core::{HeapConfig, MallocState};

use crate::error::HarnessError;
use crate::report::ChurnReport;
use crate::rng::XorShift64;

/// Percent of operations that allocate while blocks are live.
const ALLOC_PERCENT: u64 = 55;

#[derive(Debug, Clone, Copy)]
pub struct ChurnParams {
    pub seed: u64,
    pub ops: usize,
    pub max_size: usize,
}

struct LiveBlock {
    ptr: NonNull<u8>,
    size: usize,
    pattern: u8,
}

impl LiveBlock {
    fn fill(&self) {
        // SAFETY: the allocator returned at least `size` writable bytes.
        unsafe { self.ptr.as_ptr().write_bytes(self.pattern, self.size) };
    }

    fn intact(&self) -> bool {
        // SAFETY: as in `fill`; the block is still live.
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) };
        bytes.iter().all(|&b| b == self.pattern)
    }
}

/// Runs the storm and returns its metrics plus the retained lifecycle records.
pub fn run(
    config: HeapConfig,
    params: ChurnParams,
) -> Result<(ChurnReport, Vec<AllocatorLogRecord>), HarnessError> {
    if params.max_size == 0 {
        return Err(HarnessError::ZeroMaxSize);
    }
    let mut state = MallocState::new().with_config(config);
    let mut rng = XorShift64::new(params.seed);
    let mut live: Vec<LiveBlock> = Vec::new();
    let mut report = ChurnReport {
        seed: params.seed,
        ops: params.ops,
        max_size: params.max_size,
        ..ChurnReport::default()
    };

    for _ in 0..params.ops {
        if live.is_empty() || rng.chance(ALLOC_PERCENT) {
            let size = rng.gen_range(0, params.max_size);
            let Some(ptr) = state.malloc(size)? else {
                report.zero_size_requests += 1;
                continue;
            };
            // SAFETY: pointer just returned by this state.
            let usable = unsafe { state.usable_size(ptr.as_ptr()) };
            if size > MAX_SMALL_SIZE {
                report.large_allocations += 1;
                if usable != LARGE_USABLE_FALLBACK {
                    report.usable_size_violations += 1;
                }
            } else {
                report.small_allocations += 1;
                if usable < size || !usable.is_power_of_two() {
                    report.usable_size_violations += 1;
                }
            }
            report.allocations += 1;
            let block = LiveBlock {
                ptr,
                size,
                pattern: (report.allocations as u8) | 1,
            };
            block.fill();
            live.push(block);
            report.peak_live = report.peak_live.max(live.len());
        } else {
            let index = rng.gen_range(0, live.len() - 1);
            let block = live.swap_remove(index);
            release(&mut state, &block, &mut report);
        }
    }

    report.live_at_end = live.len();
    for block in live.drain(..) {
        release(&mut state, &block, &mut report);
    }
    report.pages_carved = state.pages_carved();
    Ok((report, state.drain_lifecycle_logs()))
}

fn release(state: &mut MallocState, block: &LiveBlock, report: &mut ChurnReport) {
    if !block.intact() {
        report.corrupted_blocks += 1;
    }
    // SAFETY: the block is live and owned by the storm; it is not touched again.
    unsafe { state.free(block.ptr.as_ptr()) };
    report.frees += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64, ops: usize, max_size: usize) -> ChurnParams {
        ChurnParams { seed, ops, max_size }
    }

    #[test]
    fn small_only_storm_is_clean() {
        let (report, _) = run(HeapConfig::QUIET, params(0xDEAD_BEEF, 5_000, 512)).unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.large_allocations, 0);
        assert_eq!(report.frees, report.allocations);
        assert!(report.pages_carved > 0);
    }

    #[test]
    fn mixed_storm_is_clean() {
        let (report, _) = run(HeapConfig::QUIET, params(7, 3_000, 3 * 4096)).unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert!(report.large_allocations > 0);
        assert!(report.small_allocations > 0);
    }

    #[test]
    fn same_seed_same_report() {
        let a = run(HeapConfig::QUIET, params(99, 2_000, 1024)).unwrap().0;
        let b = run(HeapConfig::QUIET, params(99, 2_000, 1024)).unwrap().0;
        assert_eq!(a, b);
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let err = run(HeapConfig::QUIET, params(1, 10, 0)).unwrap_err();
        assert!(matches!(err, HarnessError::ZeroMaxSize));
    }

    #[test]
    fn tiny_max_size_counts_zero_requests() {
        let (report, _) = run(HeapConfig::QUIET, params(3, 500, 1)).unwrap();
        assert!(report.zero_size_requests > 0);
        assert!(report.is_clean());
    }
}
