//! Runtime logging configuration.
//!
//! The log threshold is set via the `SLABMALLOC_LOG` environment variable:
//! - `off`: no lifecycle records are kept.
//! - `error` / `warn` (default) / `info` / `debug`: records at or above the
//!   level are kept in the allocator's lifecycle ring.
//! - `trace`: every event is kept, and each allocation is also echoed to
//!   stderr as `malloc(<size>) -> <ptr>`.
//!
//! The variable is read through [`crate::os::env_bytes`], which does not
//! allocate, so resolution is safe from inside the allocator itself.

use crate::malloc::log::AllocatorLogLevel;
use crate::os;

/// Name of the environment variable holding the log threshold.
pub const LOG_ENV: &core::ffi::CStr = c"SLABMALLOC_LOG";

/// Per-instance configuration, resolved once and then cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Minimum level recorded in the lifecycle ring; `None` disables it.
    pub log_threshold: Option<AllocatorLogLevel>,
    /// Echo each allocation to stderr.
    pub echo_stderr: bool,
}

impl HeapConfig {
    /// Configuration used when the variable is absent or unparseable.
    pub const DEFAULT: Self = Self::from_threshold(Some(AllocatorLogLevel::Warn));

    /// Nothing recorded, nothing echoed.
    pub const QUIET: Self = Self::from_threshold(None);

    /// Everything recorded and echoed.
    pub const TRACE: Self = Self::from_threshold(Some(AllocatorLogLevel::Trace));

    /// Builds a configuration for a threshold; only `Trace` echoes.
    #[must_use]
    pub const fn from_threshold(log_threshold: Option<AllocatorLogLevel>) -> Self {
        Self {
            log_threshold,
            echo_stderr: matches!(log_threshold, Some(AllocatorLogLevel::Trace)),
        }
    }

    /// Same thresholds, stderr echo switched off.
    #[must_use]
    pub const fn without_echo(mut self) -> Self {
        self.echo_stderr = false;
        self
    }

    /// Parse from a raw value (case-insensitive, with aliases).
    #[must_use]
    pub fn from_bytes_loose(raw: &[u8]) -> Self {
        fn any_of(raw: &[u8], names: &[&str]) -> bool {
            names.iter().any(|n| raw.eq_ignore_ascii_case(n.as_bytes()))
        }
        let threshold = if any_of(raw, &["off", "none", "disabled", "0"]) {
            None
        } else if any_of(raw, &["trace", "all", "verbose"]) {
            Some(AllocatorLogLevel::Trace)
        } else if any_of(raw, &["debug"]) {
            Some(AllocatorLogLevel::Debug)
        } else if any_of(raw, &["info"]) {
            Some(AllocatorLogLevel::Info)
        } else if any_of(raw, &["error", "err"]) {
            Some(AllocatorLogLevel::Error)
        } else {
            return Self::DEFAULT;
        };
        Self::from_threshold(threshold)
    }

    /// Reads `SLABMALLOC_LOG` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        os::env_bytes(LOG_ENV).map_or(Self::DEFAULT, Self::from_bytes_loose)
    }

    /// True when a record at `level` should be kept.
    #[must_use]
    pub fn records(&self, level: AllocatorLogLevel) -> bool {
        self.log_threshold.is_some_and(|threshold| level >= threshold)
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_levels() {
        assert_eq!(HeapConfig::from_bytes_loose(b"off"), HeapConfig::QUIET);
        assert_eq!(HeapConfig::from_bytes_loose(b"NONE"), HeapConfig::QUIET);
        assert_eq!(HeapConfig::from_bytes_loose(b"trace"), HeapConfig::TRACE);
        assert_eq!(HeapConfig::from_bytes_loose(b"Verbose"), HeapConfig::TRACE);
        assert_eq!(
            HeapConfig::from_bytes_loose(b"debug").log_threshold,
            Some(AllocatorLogLevel::Debug)
        );
        assert_eq!(
            HeapConfig::from_bytes_loose(b"INFO").log_threshold,
            Some(AllocatorLogLevel::Info)
        );
        assert_eq!(
            HeapConfig::from_bytes_loose(b"err").log_threshold,
            Some(AllocatorLogLevel::Error)
        );
        assert_eq!(HeapConfig::from_bytes_loose(b"warn"), HeapConfig::DEFAULT);
        assert_eq!(HeapConfig::from_bytes_loose(b"bogus"), HeapConfig::DEFAULT);
        assert_eq!(HeapConfig::from_bytes_loose(b""), HeapConfig::DEFAULT);
    }

    #[test]
    fn default_is_warn_without_echo() {
        let config = HeapConfig::default();
        assert_eq!(config.log_threshold, Some(AllocatorLogLevel::Warn));
        assert!(!config.echo_stderr);
    }

    #[test]
    fn echo_only_at_trace() {
        assert!(HeapConfig::TRACE.echo_stderr);
        assert!(!HeapConfig::TRACE.without_echo().echo_stderr);
        assert!(!HeapConfig::from_bytes_loose(b"debug").echo_stderr);
        assert!(!HeapConfig::QUIET.echo_stderr);
    }

    #[test]
    fn threshold_filters_records() {
        let config = HeapConfig::DEFAULT;
        assert!(!config.records(AllocatorLogLevel::Trace));
        assert!(!config.records(AllocatorLogLevel::Info));
        assert!(config.records(AllocatorLogLevel::Warn));
        assert!(config.records(AllocatorLogLevel::Error));
        assert!(!HeapConfig::QUIET.records(AllocatorLogLevel::Error));
        assert!(HeapConfig::TRACE.records(AllocatorLogLevel::Trace));
    }
}
