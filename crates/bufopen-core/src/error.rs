//! Error type shared by every bufopen operation.
//!
//! Four failure families: allocation, open, access-mode violation and
//! underlying I/O. End-of-file is not an error; it is a zero-length read.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::flags::AccessMode;

/// Operation checked against a handle's access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
    /// Committing buffered bytes by shifting the file tail.
    PrependFlush,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Read => "read",
            Op::Write => "write",
            Op::PrependFlush => "pre-append flush",
        })
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AllocationFailure,
    OpenFailure,
    ModeViolation,
    IoFailure,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to allocate a {bytes}-byte buffer")]
    Allocation { bytes: usize },

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{op} is not permitted on a handle opened {access}")]
    ModeViolation { op: Op, access: AccessMode },

    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// The descriptor accepted fewer bytes than requested. Never retried.
    #[error("{context}: short write ({written} of {expected} bytes)")]
    ShortWrite {
        context: &'static str,
        written: usize,
        expected: usize,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Allocation { .. } => ErrorKind::AllocationFailure,
            Error::Open { .. } => ErrorKind::OpenFailure,
            Error::ModeViolation { .. } => ErrorKind::ModeViolation,
            Error::Io { .. } | Error::ShortWrite { .. } => ErrorKind::IoFailure,
        }
    }

    /// Wrap an OS error with a short description of the failing step.
    pub fn io(context: &'static str, source: io::Error) -> Self {
        Error::Io { context, source }
    }

    /// The OS error number, when the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Open { source, .. } | Error::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Allocation { .. } => io::ErrorKind::OutOfMemory,
            Error::Open { source, .. } | Error::Io { source, .. } => source.kind(),
            Error::ModeViolation { .. } => io::ErrorKind::PermissionDenied,
            Error::ShortWrite { .. } => io::ErrorKind::WriteZero,
        };
        io::Error::new(kind, err)
    }
}
