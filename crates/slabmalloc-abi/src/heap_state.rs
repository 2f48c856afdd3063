//! Process-wide allocator instance and its reentrancy guard.
//!
//! The allocator is single-threaded by contract: no locks, no atomics.
//! Each [`GlobalHeap`] carries an in-progress marker that is set for the
//! duration of every operation. Entering while the marker is set means the
//! allocator was re-invoked from inside itself (or from a second thread,
//! which the contract forbids), and free-list state can no longer be
//! trusted; callers treat that as fatal.

use std::cell::{Cell, UnsafeCell};
use std::fmt::Write as _;
use std::ops::{Deref, DerefMut};

use slabmalloc_core::malloc::log::LineBuf;
use slabmalloc_core::{AllocError, MallocState, os};

/// One allocator instance plus its in-progress marker.
pub struct GlobalHeap {
    state: UnsafeCell<MallocState>,
    busy: Cell<bool>,
}

// SAFETY: GlobalHeap is shared only under the single-threaded contract
// documented above. Making this a real multi-threaded allocator requires
// replacing `busy` with a mutual-exclusion primitive around the whole
// operation.
unsafe impl Sync for GlobalHeap {}

impl GlobalHeap {
    pub const fn new() -> Self {
        Self {
            state: UnsafeCell::new(MallocState::new()),
            busy: Cell::new(false),
        }
    }

    /// Marks the heap busy and hands out exclusive access to its state.
    ///
    /// Fails with [`AllocError::Reentrant`] if an operation is already in
    /// progress on this heap.
    pub fn enter(&self) -> Result<HeapGuard<'_>, AllocError> {
        if self.busy.replace(true) {
            return Err(AllocError::Reentrant);
        }
        Ok(HeapGuard { heap: self })
    }

    /// True while a [`HeapGuard`] is alive.
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

impl Default for GlobalHeap {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to a [`GlobalHeap`]'s state; clears the marker on drop.
pub struct HeapGuard<'a> {
    heap: &'a GlobalHeap,
}

impl Deref for HeapGuard<'_> {
    type Target = MallocState;

    fn deref(&self) -> &MallocState {
        // SAFETY: `busy` guarantees at most one guard exists per heap.
        unsafe { &*self.heap.state.get() }
    }
}

impl DerefMut for HeapGuard<'_> {
    fn deref_mut(&mut self) -> &mut MallocState {
        // SAFETY: as above; the guard is the unique access path.
        unsafe { &mut *self.heap.state.get() }
    }
}

impl Drop for HeapGuard<'_> {
    fn drop(&mut self) {
        self.heap.busy.set(false);
    }
}

/// Writes a one-line diagnostic to stderr and aborts.
///
/// Formats into a stack buffer: the heap may be mid-operation, so nothing
/// on this path may allocate.
pub fn fatal(err: AllocError) -> ! {
    let mut line = LineBuf::<160>::new();
    let _ = writeln!(line, "slabmalloc: fatal: {err}");
    os::write_stderr(line.as_bytes());
    os::abort()
}

/// Unwraps an allocator result, terminating the process on error.
#[inline]
pub fn or_die<T>(result: Result<T, AllocError>) -> T {
    result.unwrap_or_else(|err| fatal(err))
}
