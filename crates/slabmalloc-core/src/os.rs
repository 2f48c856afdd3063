//! Operating-system collaborator.
//!
//! Everything the allocator asks of the kernel goes through here:
//! anonymous page mappings, an environment lookup that does not allocate,
//! raw stderr writes and process abort. None of these may call back into
//! the process allocator, since this crate may *be* the process allocator.

use core::ffi::CStr;
use core::ptr::NonNull;

/// Maps `len` bytes of fresh, zero-filled, page-aligned read/write memory.
///
/// Returns the errno reported by the kernel on failure.
pub fn map_anonymous(len: usize) -> Result<NonNull<u8>, i32> {
    if len == 0 {
        return Err(libc::EINVAL);
    }
    // SAFETY: anonymous private mapping with no fd and no fixed address;
    // the kernel picks the placement and validates `len`.
    let raw = unsafe {
        libc::mmap(
            core::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if raw == libc::MAP_FAILED {
        return Err(last_errno());
    }
    NonNull::new(raw.cast::<u8>()).ok_or(libc::ENOMEM)
}

/// Looks up an environment variable without allocating.
///
/// The returned slice borrows the process environment block, which lives
/// for the rest of the process unless someone calls `setenv` on the same
/// name.
pub fn env_bytes(name: &CStr) -> Option<&'static [u8]> {
    // SAFETY: `name` is NUL-terminated. `getenv` returns either null or a
    // pointer into the environment block.
    let value = unsafe { libc::getenv(name.as_ptr()) };
    if value.is_null() {
        return None;
    }
    // SAFETY: non-null `getenv` results are valid NUL-terminated strings.
    Some(unsafe { CStr::from_ptr(value) }.to_bytes())
}

/// Writes `bytes` to fd 2, retrying short writes. Errors are dropped.
pub fn write_stderr(mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // SAFETY: the pointer/length pair comes from a live slice.
        let n = unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
        if n <= 0 {
            return;
        }
        bytes = &bytes[n as usize..];
    }
}

/// Terminates the process immediately.
pub fn abort() -> ! {
    // SAFETY: abort(3) has no preconditions.
    unsafe { libc::abort() }
}

fn last_errno() -> i32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::ENOMEM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmap_anonymous_is_page_aligned_and_zeroed() {
        let page = map_anonymous(4096).expect("mmap should succeed");
        assert_eq!(page.as_ptr() as usize % 4096, 0);
        // SAFETY: we just mapped 4096 RW bytes.
        let bytes = unsafe { core::slice::from_raw_parts_mut(page.as_ptr(), 4096) };
        assert!(bytes.iter().all(|&b| b == 0));
        bytes[4095] = 7;
        assert_eq!(bytes[4095], 7);
    }

    #[test]
    fn zero_length_mapping_is_rejected() {
        assert_eq!(map_anonymous(0), Err(libc::EINVAL));
    }

    #[test]
    fn absurd_mapping_fails_with_errno() {
        let err = map_anonymous(usize::MAX & !0xFFF).expect_err("mapping must fail");
        assert_ne!(err, 0);
    }

    #[test]
    fn env_lookup_missing_variable() {
        assert_eq!(env_bytes(c"SLABMALLOC_SURELY_UNSET_VARIABLE"), None);
    }

    #[test]
    fn env_lookup_present_variable() {
        // PATH is set in every test environment we run under.
        if std::env::var_os("PATH").is_some() {
            assert!(env_bytes(c"PATH").is_some());
        }
    }
}
