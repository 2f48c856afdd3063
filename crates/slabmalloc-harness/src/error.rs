use slabmalloc_core::AllocError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("allocator: {0}")]
    Alloc(#[from] AllocError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("--max-size must be at least 1")]
    ZeroMaxSize,
}
