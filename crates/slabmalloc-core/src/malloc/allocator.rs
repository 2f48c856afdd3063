//! Core allocator state.
//!
//! Owns the size-class table (most recently carved page per bin), the page
//! source and the lifecycle ring. Small requests are served from the
//! current page's free list, carving a new page when it runs dry; large
//! requests are mapped directly. `free` and `usable_size` recover the
//! owning page from the pointer alone.

use core::fmt::Write as _;
use core::ptr::NonNull;

use super::large::{self, LARGE_USABLE_FALLBACK};
use super::log::{AllocatorLogLevel, AllocatorLogRecord, LifecycleRing, LineBuf};
use super::page::{self, MmapPages, PageSource, Recovered, SlabPage};
use super::size_class::{self, NUM_SIZE_CLASSES, PAGE_SIZE, Route};
use crate::config::HeapConfig;
use crate::error::AllocError;
use crate::os;

/// Where a size class stands in its page lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    /// No page has been carved for this class yet.
    Empty,
    /// The current page still has free blocks.
    HasFreeCapacity,
    /// The current page's free list is empty; the next request carves.
    Exhausted,
}

/// Allocator state.
///
/// One instance manages its own pages; pointers from one instance must
/// not be passed to another. Pages are never returned to the source.
pub struct MallocState<S: PageSource = MmapPages> {
    source: S,
    /// Most recently carved page per bin; older pages hang off its chain.
    classes: [Option<SlabPage>; NUM_SIZE_CLASSES],
    /// Total slab pages carved over the lifetime of the instance.
    pages_carved: usize,
    /// `None` until first use, then resolved from the environment.
    config: Option<HeapConfig>,
    logs: LifecycleRing,
}

impl MallocState<MmapPages> {
    /// Creates an allocator backed by anonymous mappings. Configuration
    /// is read from the environment on first use.
    pub const fn new() -> Self {
        Self::with_source(MmapPages)
    }
}

impl Default for MallocState<MmapPages> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PageSource> MallocState<S> {
    /// Creates an allocator drawing pages from `source`.
    pub const fn with_source(source: S) -> Self {
        Self {
            source,
            classes: [None; NUM_SIZE_CLASSES],
            pages_carved: 0,
            config: None,
            logs: LifecycleRing::new(),
        }
    }

    /// Pins the configuration instead of reading the environment.
    #[must_use]
    pub const fn with_config(mut self, config: HeapConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Effective configuration, resolving it on first call.
    pub fn config(&mut self) -> HeapConfig {
        *self.config.get_or_insert_with(HeapConfig::from_env)
    }

    fn record(&mut self, record: AllocatorLogRecord) {
        if self.config().records(record.level) {
            self.logs.push(record);
        }
    }

    /// Trace line for a slab allocation, reporting the block size handed out.
    fn echo_alloc(&mut self, block_size: usize, ptr: NonNull<u8>) {
        if !self.config().echo_stderr {
            return;
        }
        os::write_stderr(echo_line(block_size, ptr).as_bytes());
    }

    /// Allocates at least `size` bytes.
    ///
    /// Returns `Ok(None)` for zero-byte requests. Small blocks are
    /// power-of-two sized and aligned to their size; large regions are
    /// page-aligned. Contents are unspecified.
    pub fn malloc(&mut self, size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
        match size_class::route(size) {
            Route::Empty => {
                self.record(AllocatorLogRecord::new(
                    AllocatorLogLevel::Trace,
                    "malloc",
                    "alloc_zero",
                    "noop",
                ));
                Ok(None)
            }
            Route::Large(mapped) => {
                let alloc = match large::alloc(&mut self.source, size) {
                    Ok(alloc) => alloc,
                    Err(err) => {
                        self.record(
                            AllocatorLogRecord::new(AllocatorLogLevel::Error, "malloc", "alloc", "oom")
                                .with_size(mapped)
                                .with_bin(NUM_SIZE_CLASSES),
                        );
                        return Err(err);
                    }
                };
                self.record(
                    AllocatorLogRecord::new(AllocatorLogLevel::Trace, "malloc", "alloc", "large_map")
                        .with_ptr(alloc.base.as_ptr() as usize)
                        .with_size(alloc.mapped_size)
                        .with_bin(NUM_SIZE_CLASSES),
                );
                Ok(Some(alloc.base))
            }
            Route::Small(bin) => {
                let current = self.classes[bin];
                let reused = current.and_then(|page| page.pop().map(|block| (page, block)));
                let (page, block) = match reused {
                    Some(hit) => hit,
                    None => self.carve(bin, current)?,
                };
                self.record(
                    AllocatorLogRecord::new(AllocatorLogLevel::Trace, "malloc", "alloc", "success")
                        .with_ptr(block.as_ptr() as usize)
                        .with_size(page.block_size())
                        .with_bin(bin),
                );
                self.echo_alloc(page.block_size(), block);
                Ok(Some(block))
            }
        }
    }

    /// Carves a new page for `bin`, makes it the class's current page and
    /// returns it along with the block to hand out.
    fn carve(
        &mut self,
        bin: usize,
        previous: Option<SlabPage>,
    ) -> Result<(SlabPage, NonNull<u8>), AllocError> {
        let block_size = size_class::bin_size(bin);
        let raw = match self.source.map(PAGE_SIZE) {
            Ok(raw) => raw,
            Err(err) => {
                self.record(
                    AllocatorLogRecord::new(AllocatorLogLevel::Error, "malloc", "carve", "oom")
                        .with_size(block_size)
                        .with_bin(bin),
                );
                return Err(err);
            }
        };
        // SAFETY: `raw` is a fresh page-aligned PAGE_SIZE mapping from the
        // source, owned by nobody else; `block_size` is a class size.
        let (page, block) = unsafe { SlabPage::carve_and_take(raw, block_size, previous) };
        self.classes[bin] = Some(page);
        self.pages_carved += 1;
        self.record(
            AllocatorLogRecord::new(AllocatorLogLevel::Debug, "malloc", "carve", "new_page")
                .with_ptr(page.base())
                .with_size(block_size)
                .with_bin(bin),
        );
        Ok((page, block))
    }

    /// Allocates zeroed storage for `count` elements of `size` bytes.
    pub fn calloc(&mut self, count: usize, size: usize) -> Result<Option<NonNull<u8>>, AllocError> {
        let Some(total) = count.checked_mul(size) else {
            self.record(AllocatorLogRecord::new(
                AllocatorLogLevel::Warn,
                "calloc",
                "size_overflow",
                "denied",
            ));
            return Err(AllocError::SizeOverflow { count, size });
        };
        let ptr = self.malloc(total)?;
        if let Some(ptr) = ptr {
            // SAFETY: the block or mapping just returned holds at least
            // `total` writable bytes.
            unsafe { ptr.write_bytes(0, total) };
        }
        Ok(ptr)
    }

    /// Number of bytes usable through `ptr`.
    ///
    /// Zero for null. Slab pointers report their block size; anything
    /// else (large mappings included) reports [`LARGE_USABLE_FALLBACK`].
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point into mapped, readable memory, which
    /// holds for every pointer returned by [`Self::malloc`].
    pub unsafe fn usable_size(&mut self, ptr: *const u8) -> usize {
        if ptr.is_null() {
            return 0;
        }
        // SAFETY: caller guarantees the page under `ptr` is readable.
        match unsafe { page::recover(ptr) } {
            Recovered::Slab(page) => page.block_size(),
            Recovered::Corrupt { page, block_size } => {
                self.record(
                    AllocatorLogRecord::new(
                        AllocatorLogLevel::Warn,
                        "malloc_usable_size",
                        "corrupt_header",
                        "fallback",
                    )
                    .with_ptr(page)
                    .with_size(block_size),
                );
                LARGE_USABLE_FALLBACK
            }
            Recovered::Foreign => LARGE_USABLE_FALLBACK,
        }
    }

    /// Returns the block containing `ptr` to its page's free list.
    ///
    /// Null, large and unrecognized pointers are ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point into mapped, readable memory. If it
    /// points into a slab block, that block must be live (allocated and
    /// not yet freed) and must not be used again by the caller.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            self.record(AllocatorLogRecord::new(
                AllocatorLogLevel::Trace,
                "free",
                "free_null",
                "noop",
            ));
            return;
        }
        let addr = ptr as usize;
        // SAFETY: caller guarantees the page under `ptr` is readable.
        match unsafe { page::recover(ptr) } {
            Recovered::Slab(page) => match page.block_start(addr) {
                Some(block) => {
                    // SAFETY: `block` is a block boundary of this page and,
                    // per the caller contract, currently allocated.
                    unsafe { page.push(block) };
                    self.record(
                        AllocatorLogRecord::new(AllocatorLogLevel::Trace, "free", "free", "success")
                            .with_ptr(block.as_ptr() as usize)
                            .with_size(page.block_size())
                            .with_bin(size_class::bin_index(page.block_size())),
                    );
                }
                None => self.record(
                    AllocatorLogRecord::new(AllocatorLogLevel::Warn, "free", "header_pointer", "ignored")
                        .with_ptr(addr),
                ),
            },
            Recovered::Corrupt { block_size, .. } => self.record(
                AllocatorLogRecord::new(AllocatorLogLevel::Warn, "free", "corrupt_header", "ignored")
                    .with_ptr(addr)
                    .with_size(block_size),
            ),
            Recovered::Foreign => self.record(
                AllocatorLogRecord::new(AllocatorLogLevel::Debug, "free", "free_foreign", "ignored")
                    .with_ptr(addr),
            ),
        }
    }

    /// Lifecycle state of a size class. Out-of-range bins read as `Empty`.
    pub fn class_state(&self, bin: usize) -> ClassState {
        match self.classes.get(bin).copied().flatten() {
            None => ClassState::Empty,
            Some(page) if page.has_free() => ClassState::HasFreeCapacity,
            Some(_) => ClassState::Exhausted,
        }
    }

    /// The page new requests for `bin` are served from.
    pub fn current_page(&self, bin: usize) -> Option<SlabPage> {
        self.classes.get(bin).copied().flatten()
    }

    /// Total slab pages carved so far.
    pub fn pages_carved(&self) -> usize {
        self.pages_carved
    }

    /// Retained lifecycle records, oldest first.
    pub fn lifecycle_logs(&self) -> impl Iterator<Item = &AllocatorLogRecord> + '_ {
        self.logs.iter()
    }

    /// Takes the retained lifecycle records, oldest first.
    ///
    /// Allocates the returned `Vec` from the process allocator; do not
    /// call on the instance that *is* the process allocator.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<AllocatorLogRecord> {
        let out = self.logs.iter().copied().collect();
        self.logs.clear();
        out
    }
}

/// `malloc(<block size>) -> <ptr>` plus newline, formatted on the stack.
fn echo_line(block_size: usize, ptr: NonNull<u8>) -> LineBuf<96> {
    let mut line = LineBuf::new();
    let _ = writeln!(line, "malloc({block_size}) -> {:p}", ptr.as_ptr());
    line
}
