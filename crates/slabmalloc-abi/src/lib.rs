// Every extern "C" export takes raw pointers from C callers; the contract is
// documented once per function rather than repeated as boilerplate.
#![allow(clippy::missing_safety_doc)]
//! # slabmalloc-abi
//!
//! Process-facing surface for the slabmalloc core allocator.
//!
//! This crate produces a `cdylib` exposing the allocator through prefixed
//! `extern "C"` symbols, and an `rlib` with a [`GlobalAlloc`] adapter for
//! Rust programs. Both go through a single-instance [`GlobalHeap`] that
//! guards against reentrant use and terminates the process on fatal
//! errors.
//!
//! # Architecture
//!
//! ```text
//! caller -> ABI entry (this crate) -> reentrancy guard -> MallocState -> return
//!                                         |
//!                                         +-> fatal(): diagnostic + abort
//! ```
//!
//! [`GlobalAlloc`]: std::alloc::GlobalAlloc

pub mod global_alloc;
pub mod heap_state;
pub mod malloc_abi;

pub use global_alloc::SlabAlloc;
pub use heap_state::{GlobalHeap, HeapGuard};
