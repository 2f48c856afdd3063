//! Slab pages: supply, carving, free lists and header recovery.
//!
//! Every slab page is exactly [`PAGE_SIZE`] bytes and page-aligned. Its
//! first bytes hold a [`PageHeader`]; the rest is cut into equal blocks
//! starting at the first multiple of the block size past the header.
//! Because of that layout, any pointer into a slab block can be traced
//! back to its header by masking off the low address bits, and back to
//! its block by masking with the block size.
//!
//! Header and free-list memory is only read or written from this module.

use core::mem::size_of;
use core::ptr::NonNull;

use super::size_class::{self, PAGE_SIZE};
use crate::error::AllocError;
use crate::os;

/// Sentinel written into every carved page header.
pub const PAGE_TAG: u32 = 0xF00D_FACE;

/// Bytes reserved at the start of each slab page.
pub const HEADER_SIZE: usize = size_of::<PageHeader>();

/// Source of fresh page-aligned memory.
pub trait PageSource {
    /// Maps `len` bytes (a whole number of pages) of zeroed, page-aligned
    /// read/write memory. Mappings are never returned to the source.
    fn map(&mut self, len: usize) -> Result<NonNull<u8>, AllocError>;
}

/// Pages straight from anonymous `mmap`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapPages;

impl PageSource for MmapPages {
    fn map(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        os::map_anonymous(len).map_err(|errno| AllocError::PageMapFailed { len, errno })
    }
}

/// Metadata at the start of a slab page.
#[repr(C)]
pub struct PageHeader {
    tag: u32,
    block_size: usize,
    free_list: Option<NonNull<FreeBlock>>,
    /// Page carved for the same class before this one.
    next_page: Option<NonNull<PageHeader>>,
}

/// A free block's first word, reinterpreted as a list link.
#[repr(C)]
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Offset of the first block in a page carved for `block_size`.
#[inline]
pub const fn first_block_offset(block_size: usize) -> usize {
    HEADER_SIZE.next_multiple_of(block_size)
}

/// Number of blocks a page carved for `block_size` holds.
#[inline]
pub const fn blocks_per_page(block_size: usize) -> usize {
    (PAGE_SIZE - first_block_offset(block_size)) / block_size
}

/// Handle to a carved slab page.
///
/// Only obtainable from [`SlabPage::carve`] or [`recover`], both of which
/// establish that the header is live. Pages are never unmapped, so the
/// handle stays valid for the rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabPage(NonNull<PageHeader>);

/// Result of tracing a pointer back to its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovered {
    /// The pointer lies in a slab page managed by this allocator.
    Slab(SlabPage),
    /// The tag matched but the header is not one we could have written.
    Corrupt { page: usize, block_size: usize },
    /// Large mapping or memory we do not manage.
    Foreign,
}

impl SlabPage {
    /// Lays out a header at the start of `page` and threads every whole
    /// block onto its free list. The last block carved becomes the head.
    ///
    /// # Safety
    ///
    /// `page` must be a fresh, exclusively owned, page-aligned mapping of
    /// `PAGE_SIZE` writable bytes, and `block_size` a class size.
    pub unsafe fn carve(page: NonNull<u8>, block_size: usize, previous: Option<SlabPage>) -> Self {
        // SAFETY: forwarded caller contract.
        let (slab, head) = unsafe { Self::carve_and_take(page, block_size, previous) };
        // SAFETY: `head` is the unlisted last block of this page.
        unsafe { slab.push(head) };
        slab
    }

    /// Like [`SlabPage::carve`], but hands back the block that would have
    /// become the list head instead of threading it. Every class fits at
    /// least one block per page, so there is always one to return.
    ///
    /// # Safety
    ///
    /// Same as [`SlabPage::carve`].
    pub unsafe fn carve_and_take(
        page: NonNull<u8>,
        block_size: usize,
        previous: Option<SlabPage>,
    ) -> (Self, NonNull<u8>) {
        debug_assert!(size_class::is_class_size(block_size));
        debug_assert_eq!(page.as_ptr() as usize % PAGE_SIZE, 0);

        let header = page.cast::<PageHeader>();
        // SAFETY: caller guarantees the page is writable and ours; the
        // header fits in the first HEADER_SIZE bytes and is suitably aligned.
        unsafe {
            header.write(PageHeader {
                tag: PAGE_TAG,
                block_size,
                free_list: None,
                next_page: previous.map(|p| p.0),
            });
        }
        let slab = Self(header);
        let first = first_block_offset(block_size);
        let last = first + (blocks_per_page(block_size) - 1) * block_size;
        let mut offset = first;
        while offset < last {
            // SAFETY: offset + block_size stays inside the page.
            let block = unsafe { page.add(offset) };
            // SAFETY: the block is inside this page, block-aligned, unused.
            unsafe { slab.push(block) };
            offset += block_size;
        }
        // SAFETY: `last` is the final whole block inside the page.
        (slab, unsafe { page.add(last) })
    }

    #[inline]
    fn header(self) -> *mut PageHeader {
        self.0.as_ptr()
    }

    /// Address of the page (and of its header).
    #[inline]
    pub fn base(self) -> usize {
        self.0.as_ptr() as usize
    }

    #[inline]
    pub fn block_size(self) -> usize {
        // SAFETY: SlabPage handles always point at a live header.
        unsafe { (*self.header()).block_size }
    }

    #[inline]
    pub fn has_free(self) -> bool {
        // SAFETY: as above.
        unsafe { (*self.header()).free_list.is_some() }
    }

    /// The page carved for this class before this one, if any.
    pub fn previous(self) -> Option<SlabPage> {
        // SAFETY: as above; `next_page` only ever holds carved headers.
        unsafe { (*self.header()).next_page.map(SlabPage) }
    }

    /// Pops the head of the free list.
    pub fn pop(self) -> Option<NonNull<u8>> {
        let header = self.header();
        // SAFETY: live header; list entries are free blocks inside this
        // page whose first word holds the next link.
        unsafe {
            let head = (*header).free_list?;
            (*header).free_list = (*head.as_ptr()).next;
            Some(head.cast())
        }
    }

    /// Pushes `block` onto the free list.
    ///
    /// # Safety
    ///
    /// `block` must be a block boundary inside this page that is not
    /// currently on the free list. Its first word is overwritten.
    pub unsafe fn push(self, block: NonNull<u8>) {
        let header = self.header();
        let node = block.cast::<FreeBlock>();
        // SAFETY: caller guarantees `block` is a free block of this page;
        // blocks are at least 16 bytes and 16-aligned.
        unsafe {
            node.write(FreeBlock {
                next: (*header).free_list,
            });
            (*header).free_list = Some(node);
        }
    }

    /// Number of blocks currently on the free list.
    pub fn free_count(self) -> usize {
        let mut count = 0;
        // SAFETY: walks links written by `push`/`carve` only.
        let mut cursor = unsafe { (*self.header()).free_list };
        while let Some(node) = cursor {
            count += 1;
            // SAFETY: as above.
            cursor = unsafe { (*node.as_ptr()).next };
        }
        count
    }

    /// Masks `addr` down to the start of the block containing it.
    ///
    /// Returns `None` when the address falls inside the header region or
    /// outside this page.
    pub fn block_start(self, addr: usize) -> Option<NonNull<u8>> {
        let block_size = self.block_size();
        let base = self.base();
        let start = addr & !(block_size - 1);
        if start < base + first_block_offset(block_size) || start + block_size > base + PAGE_SIZE {
            return None;
        }
        NonNull::new(start as *mut u8)
    }
}

/// Traces `ptr` back to the header at the start of its page.
///
/// # Safety
///
/// `ptr` must be non-null and the page containing it must be mapped and
/// readable. Pointers this allocator handed out always satisfy that.
pub unsafe fn recover(ptr: *const u8) -> Recovered {
    let page = (ptr as usize) & !(PAGE_SIZE - 1);
    let header = page as *const PageHeader;
    // SAFETY: caller guarantees the page is readable; page addresses are
    // aligned for PageHeader.
    let (tag, block_size) = unsafe { ((*header).tag, (*header).block_size) };
    if tag != PAGE_TAG {
        return Recovered::Foreign;
    }
    if !size_class::is_class_size(block_size) {
        return Recovered::Corrupt { page, block_size };
    }
    match NonNull::new(header.cast_mut()) {
        Some(header) => Recovered::Slab(SlabPage(header)),
        None => Recovered::Foreign,
    }
}
