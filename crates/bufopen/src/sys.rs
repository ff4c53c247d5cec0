//! Descriptor syscalls.
//!
//! Safe wrappers over `openat`, `read`, `write`, `lseek` and `close`. Each
//! wrapper issues exactly one call: no EINTR loop and no short-write
//! completion. Callers decide what a partial result means.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use bufopen_core::{Error, Result};

pub(crate) use libc::{SEEK_CUR, SEEK_END, SEEK_SET};

/// `openat(AT_FDCWD, path, oflags | O_CLOEXEC, mode)`.
pub(crate) fn open(path: &Path, oflags: i32, mode: u32) -> io::Result<OwnedFd> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "path contains an interior NUL byte",
        )
    })?;
    // SAFETY: c_path is a valid NUL-terminated string for the whole call.
    let fd = unsafe {
        libc::openat(
            libc::AT_FDCWD,
            c_path.as_ptr(),
            oflags | libc::O_CLOEXEC,
            mode as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: openat returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub(crate) fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let rc = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

pub(crate) fn write(fd: BorrowedFd<'_>, buf: &[u8]) -> io::Result<usize> {
    // SAFETY: buf is valid for reads of buf.len() bytes.
    let rc = unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

/// One `write` that must take every byte. A short count is a failure.
pub(crate) fn write_exact(fd: BorrowedFd<'_>, buf: &[u8], context: &'static str) -> Result<()> {
    let written = write(fd, buf).map_err(|e| Error::io(context, e))?;
    if written != buf.len() {
        tracing::warn!(written, expected = buf.len(), context, "short write");
        return Err(Error::ShortWrite {
            context,
            written,
            expected: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn lseek(fd: BorrowedFd<'_>, offset: i64, whence: i32) -> io::Result<u64> {
    // SAFETY: lseek has no memory-safety preconditions.
    let rc = unsafe { libc::lseek(fd.as_raw_fd(), offset as libc::off_t, whence) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as u64)
    }
}

/// Close `fd`, reporting the `close(2)` result instead of discarding it.
pub(crate) fn close(fd: OwnedFd) -> io::Result<()> {
    let raw = fd.into_raw_fd();
    // SAFETY: raw was owned by `fd` and is closed exactly once here.
    if unsafe { libc::close(raw) } < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn open_missing_file_reports_enoent() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(&dir.path().join("missing"), libc::O_RDONLY, 0).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn open_rejects_interior_nul() {
        let err = open(Path::new("bad\0name"), libc::O_RDONLY, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn write_seek_read_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        let fd = open(&path, libc::O_RDWR | libc::O_CREAT, 0o644).unwrap();

        write_exact(fd.as_fd(), b"abcdef", "test").unwrap();
        assert_eq!(lseek(fd.as_fd(), 0, SEEK_CUR).unwrap(), 6);
        assert_eq!(lseek(fd.as_fd(), 2, SEEK_SET).unwrap(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(read(fd.as_fd(), &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"cdef");
        assert_eq!(read(fd.as_fd(), &mut buf).unwrap(), 0);
        assert_eq!(lseek(fd.as_fd(), 0, SEEK_END).unwrap(), 6);

        close(fd).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    }

    #[test]
    fn write_on_read_only_descriptor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro");
        std::fs::write(&path, b"x").unwrap();
        let fd = open(&path, libc::O_RDONLY, 0).unwrap();
        let err = write_exact(fd.as_fd(), b"y", "test").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
