//! Content-shifting commit for pre-append handles.
//!
//! Inserting `n` bytes at offset `p` moves every byte in `[p, EOF)` forward
//! by `n`. Doing that in place would alias source and destination, so the
//! shift is staged through a scratch file:
//!
//! 1. payload → scratch
//! 2. original `[p, EOF)` → scratch, after the payload
//! 3. scratch → original, starting at `p`
//!
//! The scratch file is uniquely named per commit and removed afterwards.
//! Commits are not atomic: a failure (or crash) during step 3 leaves the
//! target partially rewritten.

use std::os::fd::{AsFd, BorrowedFd};
use std::path::Path;

use bufopen_core::{Error, Result};

use crate::file::IoStats;
use crate::sys::{self, SEEK_CUR, SEEK_SET};

/// Insert `payload` at the cursor of `fd`, shifting the tail forward.
///
/// `chunk` is the copy window (the handle's read-buffer storage). On success
/// the cursor sits just past the inserted bytes and the new offset is
/// returned. If staging fails the cursor is put back where it was and the
/// target is untouched.
pub(crate) fn insert_at_cursor(
    fd: BorrowedFd<'_>,
    payload: &[u8],
    chunk: &mut [u8],
    scratch_dir: &Path,
    stats: &mut IoStats,
) -> Result<u64> {
    stats.seeks += 1;
    let origin =
        sys::lseek(fd, 0, SEEK_CUR).map_err(|e| Error::io("pre-append: locate cursor", e))?;

    let scratch = tempfile::Builder::new()
        .prefix(".bufopen-")
        .suffix(".scratch")
        .tempfile_in(scratch_dir)
        .map_err(|e| Error::io("pre-append: create scratch file", e))?;
    let scratch_fd = scratch.as_file().as_fd();

    let tail = match stage(fd, scratch_fd, payload, chunk, stats) {
        Ok(tail) => tail,
        Err(e) => {
            stats.seeks += 1;
            if let Err(seek_err) = sys::lseek(fd, origin as i64, SEEK_SET) {
                tracing::warn!(error = %seek_err, origin, "could not restore cursor after failed staging");
            }
            return Err(e);
        }
    };

    stats.seeks += 1;
    sys::lseek(fd, origin as i64, SEEK_SET)
        .map_err(|e| Error::io("pre-append: return to insertion point", e))?;
    sys::lseek(scratch_fd, 0, SEEK_SET)
        .map_err(|e| Error::io("pre-append: rewind scratch file", e))?;

    loop {
        let n = sys::read(scratch_fd, chunk)
            .map_err(|e| Error::io("pre-append: read scratch file", e))?;
        if n == 0 {
            break;
        }
        stats.writes += 1;
        sys::write_exact(fd, &chunk[..n], "pre-append: write back")?;
    }

    if let Err(e) = scratch.close() {
        tracing::warn!(error = %e, "failed to remove pre-append scratch file");
    }

    let end = origin + payload.len() as u64;
    stats.seeks += 1;
    sys::lseek(fd, end as i64, SEEK_SET)
        .map_err(|e| Error::io("pre-append: position after insertion", e))?;
    stats.prepend_commits += 1;

    tracing::debug!(
        offset = origin,
        inserted = payload.len(),
        tail,
        "pre-append commit"
    );
    Ok(end)
}

/// Steps 1 and 2: payload, then the original tail, into the scratch file.
/// Returns the tail length.
fn stage(
    fd: BorrowedFd<'_>,
    scratch_fd: BorrowedFd<'_>,
    payload: &[u8],
    chunk: &mut [u8],
    stats: &mut IoStats,
) -> Result<u64> {
    sys::write_exact(scratch_fd, payload, "pre-append: stage payload")?;

    let mut tail = 0u64;
    loop {
        stats.reads += 1;
        let n = sys::read(fd, chunk).map_err(|e| Error::io("pre-append: read tail", e))?;
        if n == 0 {
            return Ok(tail);
        }
        sys::write_exact(scratch_fd, &chunk[..n], "pre-append: stage tail")?;
        tail += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom};

    fn run(initial: &[u8], at: u64, payload: &[u8], chunk_len: usize) -> (Vec<u8>, u64, IoStats) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target");
        std::fs::write(&path, initial).unwrap();
        let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(at)).unwrap();

        let mut chunk = vec![0u8; chunk_len];
        let mut stats = IoStats::default();
        let end =
            insert_at_cursor(file.as_fd(), payload, &mut chunk, dir.path(), &mut stats).unwrap();
        assert_eq!(file.stream_position().unwrap(), end);
        drop(file);

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "scratch file must be removed");
        (std::fs::read(&path).unwrap(), end, stats)
    }

    #[test]
    fn inserts_at_start() {
        let (content, end, stats) = run(b"World!", 0, b"Hello ", 4);
        assert_eq!(content, b"Hello World!");
        assert_eq!(end, 6);
        assert_eq!(stats.prepend_commits, 1);
    }

    #[test]
    fn inserts_in_the_middle() {
        let (content, end, _) = run(b"abcdef", 3, b"XYZ", 2);
        assert_eq!(content, b"abcXYZdef");
        assert_eq!(end, 6);
    }

    #[test]
    fn inserts_at_end_of_file() {
        let (content, _, _) = run(b"abc", 3, b"!", 8);
        assert_eq!(content, b"abc!");
    }

    #[test]
    fn tail_larger_than_chunk_survives() {
        let initial: Vec<u8> = (0..200u8).collect();
        let (content, _, stats) = run(&initial, 0, b"head", 7);
        assert_eq!(&content[..4], b"head");
        assert_eq!(&content[4..], &initial[..]);
        // 204 bytes written back through a 7-byte window.
        assert_eq!(stats.writes, 204_u64.div_ceil(7));
    }

    #[test]
    fn missing_scratch_dir_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target");
        std::fs::write(&path, b"keep").unwrap();
        let file = OpenOptions::new().read(true).write(true).open(&path).unwrap();

        let mut chunk = [0u8; 4];
        let mut stats = IoStats::default();
        let err = insert_at_cursor(
            file.as_fd(),
            b"x",
            &mut chunk,
            &dir.path().join("no-such-dir"),
            &mut stats,
        )
        .unwrap_err();
        assert_eq!(err.kind(), bufopen_core::ErrorKind::IoFailure);
        assert_eq!(std::fs::read(&path).unwrap(), b"keep");
    }
}
