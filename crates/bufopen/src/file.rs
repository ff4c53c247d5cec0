//! Buffered file handle.
//!
//! A [`BufferedFile`] binds an owned descriptor to one read buffer, one write
//! buffer, the access mode it was opened with, and the pre-append flag.
//!
//! Design: the descriptor cursor is the single source of truth for the
//! stream position. The write buffer holds bytes that belong at the cursor;
//! the read buffer never outlives a `read` call, because unconsumed bytes are
//! handed back to the descriptor with a relative seek before returning. That
//! keeps the cursor exact for whatever comes next (a write, a pre-append, a
//! seek).
//!
//! Not thread-safe by construction: every operation takes `&mut self`.

use std::fmt;
use std::io::{self, SeekFrom};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use bufopen_core::{
    AccessMode, BufferConfig, Error, Op, OpenFlags, ReadBuffer, Result, WriteBuffer,
};

use crate::prepend;
use crate::sys::{self, SEEK_CUR, SEEK_END, SEEK_SET};

/// Counters for calls issued against the handle's own descriptor.
///
/// Scratch-file traffic during a pre-append commit is not counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IoStats {
    /// `read` calls (refills and tail reads).
    pub reads: u64,
    /// `write` calls (flushes and pre-append write-back).
    pub writes: u64,
    /// `lseek` calls.
    pub seeks: u64,
    /// Completed pre-append commits.
    pub prepend_commits: u64,
}

pub struct BufferedFile {
    fd: OwnedFd,
    path: PathBuf,
    flags: OpenFlags,
    read_buf: ReadBuffer,
    write_buf: WriteBuffer,
    scratch_dir: PathBuf,
    stats: IoStats,
}

impl BufferedFile {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Open `path` with buffer settings from the environment.
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        Self::open_with(path, flags, &BufferConfig::from_env())
    }

    /// Open `path` with explicit buffer settings.
    ///
    /// Both buffers are allocated before the descriptor is opened. Any
    /// failure releases whatever was already acquired; no handle escapes.
    pub fn open_with(path: impl AsRef<Path>, flags: OpenFlags, config: &BufferConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Err(reason) = flags.validate() {
            return Err(Error::Open {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, reason),
            });
        }

        let read_buf = ReadBuffer::new(config.capacity)?;
        let write_buf = WriteBuffer::new(config.capacity)?;

        let mode = flags.creation.permissions().unwrap_or(0);
        let fd = sys::open(path, flags.to_bits(), mode).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "open failed");
            Error::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let scratch_dir = config
            .scratch_dir
            .clone()
            .unwrap_or_else(|| default_scratch_dir(path));

        tracing::debug!(
            path = %path.display(),
            fd = fd.as_raw_fd(),
            access = %flags.access,
            prepend = flags.prepend,
            capacity = write_buf.capacity(),
            "opened buffered file"
        );

        Ok(Self {
            fd,
            path: path.to_path_buf(),
            flags,
            read_buf,
            write_buf,
            scratch_dir,
            stats: IoStats::default(),
        })
    }

    /// Flush, then close the descriptor.
    ///
    /// The descriptor is released even when the flush fails; the flush error
    /// takes precedence in the result. Dropping a handle without calling
    /// `close` also releases the descriptor but discards pending bytes.
    pub fn close(mut self) -> Result<()> {
        let flushed = self.flush();
        if let Err(e) = &flushed {
            tracing::warn!(path = %self.path.display(), error = %e, "flush before close failed");
        }

        let BufferedFile { fd, path, .. } = self;
        let closed = sys::close(fd).map_err(|e| Error::io("close", e));
        tracing::debug!(path = %path.display(), "closed buffered file");

        flushed?;
        closed
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn access_mode(&self) -> AccessMode {
        self.flags.access
    }

    pub fn is_prepend(&self) -> bool {
        self.flags.prepend
    }

    /// Capacity of each buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.write_buf.capacity()
    }

    /// Bytes accepted by `write` that have not reached the descriptor yet.
    pub fn pending_write(&self) -> &[u8] {
        self.write_buf.pending()
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Append `data` to the stream. Returns `data.len()` on success.
    ///
    /// On a plain handle bytes are buffered and flushed each time the buffer
    /// fills. On a pre-append handle the call is self-contained: every byte
    /// is inserted at the cursor ahead of the existing tail before returning,
    /// and the cursor is then reset to the start of the file.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.require(Op::Write)?;
        if data.is_empty() {
            return Ok(0);
        }
        if self.flags.prepend {
            self.require(Op::PrependFlush)?;
        }

        let mut offset = 0;
        while offset < data.len() {
            offset += self.write_buf.push(&data[offset..]);
            if self.write_buf.is_full() {
                self.flush()?;
            }
        }

        if self.flags.prepend {
            self.flush()?;
            self.seek_raw(0, SEEK_SET, "pre-append: rewind")?;
        }
        Ok(data.len())
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    /// Commit pending bytes. A no-op when nothing is pending.
    ///
    /// On failure the pending bytes stay buffered so the call can be retried.
    pub fn flush(&mut self) -> Result<()> {
        if self.flags.prepend {
            self.require(Op::PrependFlush)?;
            return self.flush_prepend();
        }
        self.flush_plain()
    }

    fn flush_plain(&mut self) -> Result<()> {
        let pending = self.write_buf.pending();
        if pending.is_empty() {
            return Ok(());
        }
        self.stats.writes += 1;
        sys::write_exact(self.fd.as_fd(), pending, "flush")?;
        tracing::debug!(bytes = pending.len(), "flushed write buffer");
        self.write_buf.mark_flushed();
        Ok(())
    }

    fn flush_prepend(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        prepend::insert_at_cursor(
            self.fd.as_fd(),
            self.write_buf.pending(),
            self.read_buf.refill_slot(),
            &self.scratch_dir,
            &mut self.stats,
        )?;
        self.write_buf.mark_flushed();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Read up to `buf.len()` bytes. `Ok(0)` means end-of-file.
    ///
    /// Pending writes are flushed first. A refill shorter than the buffer
    /// capacity ends the call. On return the descriptor cursor sits exactly
    /// after the bytes delivered.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require(Op::Read)?;
        if !self.write_buf.is_empty() {
            self.flush()?;
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let capacity = self.read_buf.capacity();
        let mut delivered = self.read_buf.take_into(buf);
        while delivered < buf.len() {
            self.stats.reads += 1;
            let loaded = match sys::read(self.fd.as_fd(), self.read_buf.refill_slot()) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if delivered == 0 => return Err(Error::io("refill", e)),
                Err(e) => {
                    tracing::warn!(error = %e, delivered, "refill failed after a partial read");
                    break;
                }
            };
            self.read_buf.set_filled(loaded);
            tracing::trace!(loaded, "refilled read buffer");

            delivered += self.read_buf.take_into(&mut buf[delivered..]);
            if loaded < capacity {
                break;
            }
        }

        self.give_back_unread()?;
        Ok(delivered)
    }

    /// Rewind the descriptor over loaded-but-undelivered bytes.
    fn give_back_unread(&mut self) -> Result<()> {
        let unread = self.read_buf.readable();
        self.read_buf.reset();
        if unread > 0 {
            self.seek_raw(-(unread as i64), SEEK_CUR, "give back unread bytes")?;
            tracing::trace!(unread, "gave back unread bytes");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Seeking
    // -----------------------------------------------------------------------

    /// Flush pending writes and move the cursor.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.write_buf.is_empty() {
            self.flush()?;
        }
        self.read_buf.reset();
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => {
                let n = i64::try_from(n).map_err(|_| {
                    Error::io(
                        "seek",
                        io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"),
                    )
                })?;
                (n, SEEK_SET)
            }
            SeekFrom::Current(n) => (n, SEEK_CUR),
            SeekFrom::End(n) => (n, SEEK_END),
        };
        self.seek_raw(offset, whence, "seek")
    }

    /// Current stream position (flushes pending writes).
    pub fn position(&mut self) -> Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    fn seek_raw(&mut self, offset: i64, whence: i32, context: &'static str) -> Result<u64> {
        self.stats.seeks += 1;
        sys::lseek(self.fd.as_fd(), offset, whence).map_err(|e| Error::io(context, e))
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn require(&self, op: Op) -> Result<()> {
        let access = self.flags.access;
        let allowed = match op {
            Op::Read => access.can_read(),
            Op::Write => access.can_write(),
            Op::PrependFlush => access == AccessMode::ReadWrite,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::ModeViolation { op, access })
        }
    }
}

fn default_scratch_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

impl fmt::Debug for BufferedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedFile")
            .field("fd", &self.fd.as_raw_fd())
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("capacity", &self.write_buf.capacity())
            .field("pending_write", &self.write_buf.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// std::io adapters
// ---------------------------------------------------------------------------

impl io::Read for BufferedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        BufferedFile::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for BufferedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BufferedFile::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        BufferedFile::flush(self).map_err(Into::into)
    }
}

impl io::Seek for BufferedFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        BufferedFile::seek(self, pos).map_err(Into::into)
    }
}
