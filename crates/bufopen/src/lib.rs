//! # bufopen
//!
//! Buffered file handles over raw descriptors.
//!
//! A [`BufferedFile`] owns a descriptor plus one fixed-capacity buffer per
//! direction. Writes accumulate and are flushed when the buffer fills, on
//! [`BufferedFile::flush`], before a read, and on [`BufferedFile::close`].
//! Reads refill from the descriptor on demand.
//!
//! Handles opened with the pre-append flag insert written bytes ahead of the
//! existing tail instead of overwriting it:
//!
//! ```no_run
//! use bufopen::{BufferedFile, OpenFlags};
//!
//! // file contains "World!"
//! let mut f = BufferedFile::open("greeting.txt", OpenFlags::read_write().with_prepend())?;
//! f.write(b"Hello ")?;
//! f.close()?;
//! // file contains "Hello World!"
//! # Ok::<(), bufopen::Error>(())
//! ```

mod file;
mod prepend;
mod sys;

pub use bufopen_core::config::{self, BufferConfig, DEFAULT_CAPACITY};
pub use bufopen_core::flags::{self, AccessMode, Creation, O_PREAPPEND, OpenFlags};
pub use bufopen_core::{Error, ErrorKind, Op, Result};
pub use file::{BufferedFile, IoStats};
