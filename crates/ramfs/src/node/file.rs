//! Payload-carrying nodes: regular files and symlinks.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::error::FsError;
use crate::mode::{FileMode, OpMode};

/// A payload-carrying node.
///
/// `data` holds the file contents for a regular file and the target path
/// for a symlink; the two are distinguished by the symlink type bit in
/// `mode`.
#[derive(Debug, Clone)]
pub(crate) struct Inode {
    pub(crate) modtime: SystemTime,
    pub(crate) mode: FileMode,
    pub(crate) data: Vec<u8>,
}

impl Default for Inode {
    fn default() -> Self {
        Self {
            modtime: UNIX_EPOCH,
            mode: FileMode::default(),
            data: Vec::new(),
        }
    }
}

impl Inode {
    /// Create a node with the given mode and payload, stamped now.
    pub(crate) fn new(mode: FileMode, data: Vec<u8>) -> Self {
        Self {
            modtime: SystemTime::now(),
            mode,
            data,
        }
    }

    /// Check that the requested handle capabilities are allowed by the
    /// permission bits: reading needs a read bit, writing a write bit.
    pub(crate) fn check_open(&self, op_mode: OpMode) -> Result<(), FsError> {
        if op_mode.contains(OpMode::READ) && !self.mode.readable()
            || op_mode.contains(OpMode::WRITE) && !self.mode.writable()
        {
            return Err(FsError::PermissionDenied);
        }
        Ok(())
    }

    /// A copy of the payload; requires a read bit.
    pub(crate) fn bytes(&self) -> Result<Vec<u8>, FsError> {
        if !self.mode.readable() {
            return Err(FsError::PermissionDenied);
        }
        Ok(self.data.clone())
    }

    /// The payload as a string (the target of a symlink); requires a read
    /// bit.
    pub(crate) fn target(&self) -> Result<String, FsError> {
        if !self.mode.readable() {
            return Err(FsError::PermissionDenied);
        }
        Ok(String::from_utf8_lossy(&self.data).into_owned())
    }

    /// Replace the permission bits, preserving the symlink type bit.
    pub(crate) fn set_mode(&mut self, perm: FileMode) {
        self.mode = (self.mode & FileMode::SYMLINK) | perm;
    }

    /// Replace the modification time. Access time is not tracked.
    pub(crate) fn set_times(&mut self, mtime: SystemTime) {
        self.modtime = mtime;
    }

    pub(crate) fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Mutable wrapper: an [`Inode`] behind a lock, shareable between directory
/// entries and open handles.
///
/// Sealing takes the payload out, leaving a blank node behind; handles that
/// still reference the wrapper afterwards observe the blank payload.
#[derive(Debug, Default)]
pub(crate) struct InodeRw {
    inner: RwLock<Inode>,
}

impl InodeRw {
    pub(crate) fn new(mode: FileMode, data: Vec<u8>) -> Self {
        Self {
            inner: RwLock::new(Inode::new(mode, data)),
        }
    }

    /// The lock handles synchronize through.
    pub(crate) fn payload(&self) -> &RwLock<Inode> {
        &self.inner
    }

    pub(crate) fn check_open(&self, op_mode: OpMode) -> Result<(), FsError> {
        self.inner.read().check_open(op_mode)
    }

    pub(crate) fn bytes(&self) -> Result<Vec<u8>, FsError> {
        self.inner.read().bytes()
    }

    pub(crate) fn target(&self) -> Result<String, FsError> {
        self.inner.read().target()
    }

    pub(crate) fn mode(&self) -> FileMode {
        self.inner.read().mode
    }

    pub(crate) fn modtime(&self) -> SystemTime {
        self.inner.read().modtime
    }

    pub(crate) fn size(&self) -> u64 {
        self.inner.read().size()
    }

    pub(crate) fn set_mode(&self, perm: FileMode) {
        self.inner.write().set_mode(perm);
    }

    pub(crate) fn set_times(&self, mtime: SystemTime) {
        self.inner.write().set_times(mtime);
    }

    /// Take the payload out for sealing, leaving a blank node behind.
    pub(crate) fn seal_take(&self) -> Inode {
        std::mem::take(&mut *self.inner.write())
    }
}
