//! # slabmalloc-core
//!
//! A small-object slab allocator with a direct-mapping path for large
//! requests. Requests up to 2048 bytes are rounded to a power-of-two size
//! class and served from single pages carved into equal blocks; anything
//! larger gets its own page-rounded mapping.
//!
//! Raw address manipulation is confined to [`os`], [`malloc::page`] and
//! [`malloc::allocator`]; everything else is safe Rust.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod malloc;
#[allow(unsafe_code)]
pub mod os;

pub use config::HeapConfig;
pub use error::AllocError;
pub use malloc::MallocState;
