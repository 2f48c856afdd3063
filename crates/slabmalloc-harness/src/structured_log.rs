//! Lifecycle records as JSON lines.

use std::io::Write;

use slabmalloc_core::malloc::AllocatorLogRecord;

/// Writes one JSON object per record, each on its own line.
pub fn write_json_lines<'a, W, I>(mut out: W, records: I) -> Result<usize, crate::HarnessError>
where
    W: Write,
    I: IntoIterator<Item = &'a AllocatorLogRecord>,
{
    let mut written = 0;
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
