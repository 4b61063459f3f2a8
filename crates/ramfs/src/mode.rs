//! Mode bits, handle capability sets, and open-time flags.

use std::fmt;
use std::ops::{BitAnd, BitOr};

/// File mode bits: type bits plus `rwxrwxrwx` permission triples.
///
/// The directory and symlink type bits live above the permission range and
/// are never user-settable; mode-changing operations replace the permission
/// bits only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileMode(u32);

impl FileMode {
    /// Directory type bit.
    pub const DIR: FileMode = FileMode(1 << 31);
    /// Symbolic link type bit.
    pub const SYMLINK: FileMode = FileMode(1 << 27);
    /// Mask of all permission bits.
    pub const PERM: FileMode = FileMode(0o777);

    /// Mask of the read permission bits (owner, group, other).
    pub(crate) const READ: FileMode = FileMode(0o444);
    /// Mask of the write permission bits (owner, group, other).
    pub(crate) const WRITE: FileMode = FileMode(0o222);

    /// Build a mode from raw bits.
    pub const fn new(bits: u32) -> Self {
        FileMode(bits)
    }

    /// The raw bit pattern.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether the directory type bit is set.
    pub const fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }

    /// Whether the symlink type bit is set.
    pub const fn is_symlink(self) -> bool {
        self.0 & Self::SYMLINK.0 != 0
    }

    /// The permission bits only.
    pub const fn perm(self) -> FileMode {
        FileMode(self.0 & Self::PERM.0)
    }

    /// Whether any read bit is set.
    pub(crate) const fn readable(self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    /// Whether any write bit is set.
    pub(crate) const fn writable(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }
}

impl From<u32> for FileMode {
    fn from(bits: u32) -> Self {
        FileMode(bits)
    }
}

impl BitOr for FileMode {
    type Output = FileMode;

    fn bitor(self, rhs: FileMode) -> FileMode {
        FileMode(self.0 | rhs.0)
    }
}

impl BitAnd for FileMode {
    type Output = FileMode;

    fn bitand(self, rhs: FileMode) -> FileMode {
        FileMode(self.0 & rhs.0)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out: [u8; 10] = *b"----------";
        if self.is_dir() {
            out[0] = b'd';
        } else if self.is_symlink() {
            out[0] = b'l';
        }
        for (i, ch) in b"rwxrwxrwx".iter().enumerate() {
            if self.0 >> (8 - i) & 1 == 1 {
                out[i + 1] = *ch;
            }
        }
        f.write_str(std::str::from_utf8(&out).unwrap_or("?"))
    }
}

/// Capability set granted to a handle at open time.
///
/// The empty set marks a closed handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpMode(u8);

impl OpMode {
    pub(crate) const CLOSED: OpMode = OpMode(0);
    pub(crate) const READ: OpMode = OpMode(1);
    pub(crate) const WRITE: OpMode = OpMode(1 << 1);
    pub(crate) const SEEK: OpMode = OpMode(1 << 2);

    /// Whether every capability in `other` is present.
    pub(crate) const fn contains(self, other: OpMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) const fn is_closed(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for OpMode {
    type Output = OpMode;

    fn bitor(self, rhs: OpMode) -> OpMode {
        OpMode(self.0 | rhs.0)
    }
}

/// Flags controlling how a file is opened or created.
///
/// Each flag matches the intention of its similarly named host counterpart:
/// `EXCL` requires the destination to be absent, `CREATE` alone tolerates
/// either state, neither requires it to exist; `TRUNCATE` and `APPEND`
/// adjust the handle after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(u8);

impl OpenFlags {
    /// Grant the read capability.
    pub const READ_ONLY: OpenFlags = OpenFlags(1);
    /// Grant the write capability.
    pub const WRITE_ONLY: OpenFlags = OpenFlags(1 << 1);
    /// Position the cursor at the end of the data after opening.
    pub const APPEND: OpenFlags = OpenFlags(1 << 2);
    /// Create the file when it does not exist.
    pub const CREATE: OpenFlags = OpenFlags(1 << 3);
    /// Require that the file does not exist.
    pub const EXCL: OpenFlags = OpenFlags(1 << 4);
    /// Reset the file to zero length after opening.
    pub const TRUNCATE: OpenFlags = OpenFlags(1 << 5);
    /// Grant both the read and write capabilities.
    pub const READ_WRITE: OpenFlags = OpenFlags(1 | 1 << 1);

    /// Whether every flag in `other` is present.
    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}
