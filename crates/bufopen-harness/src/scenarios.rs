//! End-to-end scenarios.
//!
//! Each scenario gets its own empty directory, builds the files it needs,
//! drives the library and compares the on-disk result with what a plain
//! unbuffered implementation would produce.

use std::borrow::Cow;
use std::path::Path;

use bufopen::{BufferConfig, BufferedFile, ErrorKind, OpenFlags};

use crate::error::{HarnessError, HarnessResult};

pub struct Scenario {
    pub name: &'static str,
    /// Behaviour under test, in a few words.
    pub section: &'static str,
    run: fn(&Path) -> HarnessResult<()>,
}

impl Scenario {
    pub const fn new(
        name: &'static str,
        section: &'static str,
        run: fn(&Path) -> HarnessResult<()>,
    ) -> Self {
        Self { name, section, run }
    }

    pub fn run(&self, dir: &Path) -> HarnessResult<()> {
        (self.run)(dir)
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("section", &self.section)
            .finish_non_exhaustive()
    }
}

static SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "prepend_hello_world",
        section: "pre-append: insert before existing content",
        run: prepend_hello_world,
    },
    Scenario {
        name: "prepend_stacks_in_reverse",
        section: "pre-append: successive handles compose P2 P1 C",
        run: prepend_stacks_in_reverse,
    },
    Scenario {
        name: "prepend_requires_read_write",
        section: "pre-append: access mode",
        run: prepend_requires_read_write,
    },
    Scenario {
        name: "round_trip_chunked",
        section: "write/read: round trip",
        run: round_trip_chunked,
    },
    Scenario {
        name: "buffer_boundary",
        section: "write: eager flush on full buffer",
        run: buffer_boundary,
    },
    Scenario {
        name: "read_after_write",
        section: "read: pending writes flushed first",
        run: read_after_write,
    },
    Scenario {
        name: "short_read_then_eof",
        section: "read: end of file",
        run: short_read_then_eof,
    },
    Scenario {
        name: "write_rejected_on_read_only",
        section: "write: access mode",
        run: write_rejected_on_read_only,
    },
    Scenario {
        name: "read_rejected_on_write_only",
        section: "read: access mode",
        run: read_rejected_on_write_only,
    },
    Scenario {
        name: "open_missing_file",
        section: "open: failure",
        run: open_missing_file,
    },
    Scenario {
        name: "flush_is_idempotent",
        section: "flush: repeated calls",
        run: flush_is_idempotent,
    },
    Scenario {
        name: "append_lands_at_end",
        section: "write: append mode",
        run: append_lands_at_end,
    },
];

pub fn all() -> &'static [Scenario] {
    SCENARIOS
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn show(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn expect_bytes(what: &'static str, expected: &[u8], actual: &[u8]) -> HarnessResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::mismatch(what, show(expected), show(actual)))
    }
}

fn expect_file(path: &Path, expected: &[u8]) -> HarnessResult<()> {
    expect_bytes("file content", expected, &std::fs::read(path)?)
}

fn expect_eq<T: PartialEq + std::fmt::Debug>(
    what: &'static str,
    expected: T,
    actual: T,
) -> HarnessResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::mismatch(what, expected, actual))
    }
}

fn expect_kind<T: std::fmt::Debug>(
    what: &'static str,
    expected: ErrorKind,
    result: bufopen::Result<T>,
) -> HarnessResult<()> {
    match result {
        Err(e) if e.kind() == expected => Ok(()),
        Err(e) => Err(HarnessError::mismatch(what, expected, e.kind())),
        Ok(v) => Err(HarnessError::mismatch(what, expected, v)),
    }
}

fn small(capacity: usize) -> BufferConfig {
    BufferConfig::with_capacity(capacity)
}

// ---------------------------------------------------------------------------
// Pre-append
// ---------------------------------------------------------------------------

fn prepend_hello_world(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("greeting.txt");
    std::fs::write(&path, b"World!")?;

    let mut f = BufferedFile::open(&path, OpenFlags::read_write().with_prepend())?;
    f.write(b"Hello ")?;
    f.close()?;
    expect_file(&path, b"Hello World!")
}

fn prepend_stacks_in_reverse(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("stack.txt");
    std::fs::write(&path, b"data3")?;

    for payload in [&b"data2 "[..], &b"data1 "[..]] {
        let mut f =
            BufferedFile::open_with(&path, OpenFlags::read_write().with_prepend(), &small(4))?;
        f.write(payload)?;
        f.close()?;
    }
    expect_file(&path, b"data1 data2 data3")
}

fn prepend_requires_read_write(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("guarded.txt");
    std::fs::write(&path, b"original")?;

    let mut f = BufferedFile::open(&path, OpenFlags::write_only().with_prepend())?;
    expect_kind("write-only pre-append", ErrorKind::ModeViolation, f.write(b"x"))?;
    drop(f);

    let mut f = BufferedFile::open(&path, OpenFlags::read_only().with_prepend())?;
    expect_kind("read-only pre-append", ErrorKind::ModeViolation, f.write(b"x"))?;
    drop(f);

    expect_file(&path, b"original")
}

// ---------------------------------------------------------------------------
// Plain buffering
// ---------------------------------------------------------------------------

fn round_trip_chunked(dir: &Path) -> HarnessResult<()> {
    let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
    let path = dir.join("round_trip.bin");

    let mut f = BufferedFile::open_with(
        &path,
        OpenFlags::write_only().with_create(0o644).with_truncate(),
        &small(64),
    )?;
    for piece in data.chunks(37) {
        f.write(piece)?;
    }
    f.close()?;

    let mut f = BufferedFile::open_with(&path, OpenFlags::read_only(), &small(50))?;
    let mut back = Vec::with_capacity(data.len());
    let mut chunk = [0u8; 23];
    loop {
        let n = f.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        back.extend_from_slice(&chunk[..n]);
    }
    f.close()?;
    expect_bytes("read back", &data, &back)
}

fn buffer_boundary(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("boundary.txt");
    let flags = OpenFlags::write_only().with_create(0o644).with_truncate();

    let mut f = BufferedFile::open_with(&path, flags, &small(4))?;
    f.write(b"abcd")?;
    expect_eq("flushes after exactly capacity", 1, f.stats().writes)?;
    expect_eq("pending after exactly capacity", 0, f.pending_write().len())?;
    f.close()?;

    let mut f = BufferedFile::open_with(&path, flags, &small(4))?;
    f.write(b"abcde")?;
    expect_eq("flushes after capacity + 1", 1, f.stats().writes)?;
    expect_eq("pending after capacity + 1", 1, f.pending_write().len())?;
    f.close()?;
    expect_file(&path, b"abcde")
}

fn read_after_write(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("raw.txt");
    std::fs::write(&path, b"hello world")?;

    let mut f = BufferedFile::open_with(&path, OpenFlags::read_write(), &small(64))?;
    f.write(b"HELLO")?;
    let mut buf = [0u8; 32];
    let n = f.read(&mut buf)?;
    expect_bytes("bytes after pending write", b" world", &buf[..n])?;
    f.close()?;
    expect_file(&path, b"HELLO world")
}

fn short_read_then_eof(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("short.txt");
    std::fs::write(&path, b"abc")?;

    let mut f = BufferedFile::open_with(&path, OpenFlags::read_only(), &small(8))?;
    let mut buf = [0u8; 10];
    expect_eq("first read", 3, f.read(&mut buf)?)?;
    expect_eq("second read", 0, f.read(&mut buf)?)
}

fn write_rejected_on_read_only(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("ro.txt");
    std::fs::write(&path, b"original")?;

    let mut f = BufferedFile::open(&path, OpenFlags::read_only())?;
    expect_kind("write on read-only", ErrorKind::ModeViolation, f.write(b"x"))?;
    f.close()?;
    expect_file(&path, b"original")
}

fn read_rejected_on_write_only(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("wo.txt");
    std::fs::write(&path, b"data")?;

    let mut f = BufferedFile::open(&path, OpenFlags::write_only())?;
    let mut buf = [0u8; 4];
    expect_kind("read on write-only", ErrorKind::ModeViolation, f.read(&mut buf))?;
    f.close()?;
    Ok(())
}

fn open_missing_file(dir: &Path) -> HarnessResult<()> {
    expect_kind(
        "open without create",
        ErrorKind::OpenFailure,
        BufferedFile::open(dir.join("missing.txt"), OpenFlags::read_only()),
    )
}

fn flush_is_idempotent(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("flush.txt");
    let mut f = BufferedFile::open_with(
        &path,
        OpenFlags::write_only().with_create(0o644),
        &small(16),
    )?;
    f.write(b"once")?;
    f.flush()?;
    f.flush()?;
    expect_eq("descriptor writes", 1, f.stats().writes)?;
    f.close()?;
    expect_file(&path, b"once")
}

fn append_lands_at_end(dir: &Path) -> HarnessResult<()> {
    let path = dir.join("append.txt");
    std::fs::write(&path, b"Initial data.")?;

    let mut f = BufferedFile::open(&path, OpenFlags::write_only().with_append())?;
    f.write(b" Appended data.")?;
    f.close()?;
    expect_file(&path, b"Initial data. Appended data.")
}
