//! Open-mode model.
//!
//! Describes how a handle is opened: access mode, creation (with its
//! permission mask), truncation, append, and the pre-append extension.
//!
//! Design: the pre-append bit is a property of the handle, not of the
//! descriptor. [`OpenFlags::to_bits`] never emits it, so the OS never sees
//! it. Creation permissions travel inside [`Creation`] instead of an
//! optional trailing argument.

use std::fmt;

// ---------------------------------------------------------------------------
// POSIX bit values (host encoding)
// ---------------------------------------------------------------------------

pub const O_RDONLY: i32 = libc::O_RDONLY;
pub const O_WRONLY: i32 = libc::O_WRONLY;
pub const O_RDWR: i32 = libc::O_RDWR;
pub const O_ACCMODE: i32 = libc::O_ACCMODE;
pub const O_CREAT: i32 = libc::O_CREAT;
pub const O_EXCL: i32 = libc::O_EXCL;
pub const O_TRUNC: i32 = libc::O_TRUNC;
pub const O_APPEND: i32 = libc::O_APPEND;

/// Pre-append extension bit. Not a kernel flag; stripped before `openat`.
///
/// Bit 30 is unused by the Linux open flags. Callers on other hosts must not
/// combine it with a native flag that shares the bit.
pub const O_PREAPPEND: i32 = 0x4000_0000;

/// Permission mask used by fopen-style modes that create files.
pub const DEFAULT_CREATE_MODE: u32 = 0o666;

// ---------------------------------------------------------------------------
// Access mode
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    #[default]
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub const fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub const fn can_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }

    pub const fn bits(self) -> i32 {
        match self {
            Self::ReadOnly => O_RDONLY,
            Self::WriteOnly => O_WRONLY,
            Self::ReadWrite => O_RDWR,
        }
    }

    /// Decode the `O_ACCMODE` field. All access bits set is not a valid mode.
    pub const fn from_bits(bits: i32) -> Option<Self> {
        match bits & O_ACCMODE {
            O_RDONLY => Some(Self::ReadOnly),
            O_WRONLY => Some(Self::WriteOnly),
            O_RDWR => Some(Self::ReadWrite),
            _ => None,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "read-only",
            Self::WriteOnly => "write-only",
            Self::ReadWrite => "read-write",
        })
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Whether open may create the file, and with which permission bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Creation {
    /// The file must already exist.
    #[default]
    Existing,
    /// `O_CREAT` with the given mode (subject to the process umask).
    Create(u32),
    /// `O_CREAT | O_EXCL` with the given mode.
    CreateNew(u32),
}

impl Creation {
    pub const fn permissions(self) -> Option<u32> {
        match self {
            Self::Existing => None,
            Self::Create(mode) | Self::CreateNew(mode) => Some(mode),
        }
    }

    pub const fn bits(self) -> i32 {
        match self {
            Self::Existing => 0,
            Self::Create(_) => O_CREAT,
            Self::CreateNew(_) => O_CREAT | O_EXCL,
        }
    }
}

// ---------------------------------------------------------------------------
// Open flags
// ---------------------------------------------------------------------------

/// Logical open mode of a buffered handle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenFlags {
    pub access: AccessMode,
    pub creation: Creation,
    pub truncate: bool,
    pub append: bool,
    /// Writes insert ahead of the existing tail instead of overwriting it.
    pub prepend: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            access: AccessMode::ReadOnly,
            ..Default::default()
        }
    }

    pub fn write_only() -> Self {
        Self {
            access: AccessMode::WriteOnly,
            ..Default::default()
        }
    }

    pub fn read_write() -> Self {
        Self {
            access: AccessMode::ReadWrite,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_create(mut self, mode: u32) -> Self {
        self.creation = Creation::Create(mode);
        self
    }

    #[must_use]
    pub fn with_create_new(mut self, mode: u32) -> Self {
        self.creation = Creation::CreateNew(mode);
        self
    }

    #[must_use]
    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    #[must_use]
    pub fn with_append(mut self) -> Self {
        self.append = true;
        self
    }

    #[must_use]
    pub fn with_prepend(mut self) -> Self {
        self.prepend = true;
        self
    }

    pub fn is_readable(&self) -> bool {
        self.access.can_read()
    }

    pub fn is_writable(&self) -> bool {
        self.access.can_write()
    }

    /// Reject combinations no handle can honour.
    ///
    /// `O_APPEND` forces every write to end-of-file, which defeats insertion.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.prepend && self.append {
            return Err("pre-append cannot be combined with append");
        }
        Ok(())
    }

    /// POSIX `O_*` bits for `openat`. The pre-append bit is never included.
    pub fn to_bits(&self) -> i32 {
        let mut oflags = self.access.bits() | self.creation.bits();
        if self.truncate {
            oflags |= O_TRUNC;
        }
        if self.append {
            oflags |= O_APPEND;
        }
        oflags
    }

    /// Decode a POSIX bit combination, extracting [`O_PREAPPEND`].
    ///
    /// `permissions` is only consulted when `O_CREAT` is present. Returns
    /// `None` for an invalid access field.
    pub fn from_bits(bits: i32, permissions: u32) -> Option<Self> {
        let access = AccessMode::from_bits(bits)?;
        let creation = match (bits & O_CREAT != 0, bits & O_EXCL != 0) {
            (false, _) => Creation::Existing,
            (true, false) => Creation::Create(permissions),
            (true, true) => Creation::CreateNew(permissions),
        };
        Some(Self {
            access,
            creation,
            truncate: bits & O_TRUNC != 0,
            append: bits & O_APPEND != 0,
            prepend: bits & O_PREAPPEND != 0,
        })
    }

    /// Parse an fopen-style mode string (e.g. `"r"`, `"w+"`, `"r+p"`).
    ///
    /// Base character `r`, `w` or `a`, then any of `+` (read-write),
    /// `b` (ignored), `x` (exclusive create) and `p` (pre-append).
    /// Returns `None` if the mode string is invalid.
    pub fn parse_mode(mode: &[u8]) -> Option<Self> {
        let (&base, modifiers) = mode.split_first()?;

        let mut flags = match base {
            b'r' => Self::read_only(),
            b'w' => Self::write_only()
                .with_create(DEFAULT_CREATE_MODE)
                .with_truncate(),
            b'a' => Self::write_only()
                .with_create(DEFAULT_CREATE_MODE)
                .with_append(),
            _ => return None,
        };

        for &m in modifiers {
            match m {
                b'+' => flags.access = AccessMode::ReadWrite,
                b'b' => {}
                b'x' => match flags.creation {
                    Creation::Create(mode) => flags.creation = Creation::CreateNew(mode),
                    Creation::CreateNew(_) => {}
                    Creation::Existing => return None,
                },
                b'p' => flags.prepend = true,
                _ => return None,
            }
        }

        Some(flags)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
