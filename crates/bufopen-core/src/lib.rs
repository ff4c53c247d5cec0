//! # bufopen-core
//!
//! Safe building blocks for the `bufopen` buffered file layer: the
//! fixed-capacity read/write buffers, the open-flag model (including the
//! pre-append extension bit), buffer configuration and the error type.
//!
//! No `unsafe` code is permitted at the crate level. Descriptor I/O lives in
//! the `bufopen` crate.

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod flags;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use config::{BufferConfig, DEFAULT_CAPACITY, default_capacity};
pub use error::{Error, ErrorKind, Op, Result};
pub use flags::{AccessMode, Creation, O_PREAPPEND, OpenFlags};
