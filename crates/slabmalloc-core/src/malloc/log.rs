//! Allocator lifecycle records.
//!
//! Records are kept in a fixed-capacity ring owned by the allocator
//! instance. Nothing here allocates: the allocator may be serving the
//! very heap a `Vec` or `String` would grow into.

use core::fmt;

use serde::Serialize;

/// Number of lifecycle records retained before the oldest is overwritten.
pub const LOG_CAPACITY: usize = 64;

/// Allocator lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocatorLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured allocator lifecycle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocatorLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Severity level.
    pub level: AllocatorLogLevel,
    /// API symbol (`malloc`, `free`, `malloc_usable_size`, `calloc`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `carve`, `free`, `free_foreign`, ...).
    pub event: &'static str,
    /// Pointer involved in the event.
    pub ptr: Option<usize>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// Size-class bin (`NUM_SIZE_CLASSES` for large allocations).
    pub bin: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
}

impl AllocatorLogRecord {
    /// A record with no pointer/size/bin context. The decision id is
    /// assigned when the record enters a [`LifecycleRing`].
    pub const fn new(
        level: AllocatorLogLevel,
        symbol: &'static str,
        event: &'static str,
        outcome: &'static str,
    ) -> Self {
        Self {
            decision_id: 0,
            level,
            symbol,
            event,
            ptr: None,
            size: None,
            bin: None,
            outcome,
        }
    }

    pub const fn with_ptr(mut self, ptr: usize) -> Self {
        self.ptr = Some(ptr);
        self
    }

    pub const fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub const fn with_bin(mut self, bin: usize) -> Self {
        self.bin = Some(bin);
        self
    }
}

/// Ring buffer of the most recent lifecycle records.
pub struct LifecycleRing {
    slots: [Option<AllocatorLogRecord>; LOG_CAPACITY],
    /// Index the next record is written to.
    head: usize,
    len: usize,
    next_decision_id: u64,
}

impl LifecycleRing {
    pub const fn new() -> Self {
        Self {
            slots: [None; LOG_CAPACITY],
            head: 0,
            len: 0,
            next_decision_id: 1,
        }
    }

    /// Appends a record, stamping it with the next decision id.
    pub fn push(&mut self, mut record: AllocatorLogRecord) {
        record.decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        self.slots[self.head] = Some(record);
        self.head = (self.head + 1) % LOG_CAPACITY;
        self.len = (self.len + 1).min(LOG_CAPACITY);
    }

    /// Iterates retained records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &AllocatorLogRecord> + '_ {
        let start = (self.head + LOG_CAPACITY - self.len) % LOG_CAPACITY;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % LOG_CAPACITY].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forgets every retained record. Decision ids keep counting.
    pub fn clear(&mut self) {
        self.slots = [None; LOG_CAPACITY];
        self.head = 0;
        self.len = 0;
    }
}

impl Default for LifecycleRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size line buffer for diagnostics written straight to fd 2.
///
/// Output past the capacity is silently truncated.
pub struct LineBuf<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> LineBuf<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl<const N: usize> Default for LineBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for LineBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = N - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}
