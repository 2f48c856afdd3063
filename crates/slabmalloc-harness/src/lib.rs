//! Scenario and stress harness for the slab allocator.
//!
//! Every run drives a private [`MallocState`](slabmalloc_core::MallocState)
//! so the harness never touches the process heap it is itself running on.
//!
//! - [`scenarios`]: the allocator's observable contract, one named case each.
//! - [`churn`]: seeded allocate/free storm with content-integrity checks.
//! - [`structured_log`]: lifecycle records as JSON lines.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod churn;
pub mod error;
pub mod report;
pub mod rng;
#[allow(unsafe_code)]
pub mod scenarios;
pub mod structured_log;

pub use error::HarnessError;
pub use report::{CaseResult, ChurnReport, ScenarioReport};
pub use rng::XorShift64;
