//! The node graph: plain and lock-wrapped nodes, directory entries, and
//! the sealing traversal.
//!
//! Every filesystem object is one of two node kinds (payload-carrying inode
//! or directory dnode), each in a plain lock-free form and a mutable
//! lock-wrapped form. [`NodeRef`] is the four-variant sum over them; cloning
//! a `NodeRef` clones an `Arc`, so directory entries and open handles share
//! ownership of the underlying node.

mod dir;
mod file;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::FsError;
use crate::handle::File;
use crate::mode::{FileMode, OpMode};

pub(crate) use dir::{Dnode, DnodeRw};
pub(crate) use file::{Inode, InodeRw};

/// A shared reference to a node.
///
/// The `Rw` variants carry a per-node lock and make up mutable trees; the
/// plain variants are immutable and lock-free, produced by sealing.
#[derive(Debug, Clone)]
pub(crate) enum NodeRef {
    File(Arc<Inode>),
    FileRw(Arc<InodeRw>),
    Dir(Arc<Dnode>),
    DirRw(Arc<DnodeRw>),
}

impl NodeRef {
    pub(crate) fn mode(&self) -> FileMode {
        match self {
            NodeRef::File(inode) => inode.mode,
            NodeRef::FileRw(inode) => inode.mode(),
            NodeRef::Dir(dnode) => dnode.mode,
            NodeRef::DirRw(dnode) => dnode.mode(),
        }
    }

    pub(crate) fn modtime(&self) -> SystemTime {
        match self {
            NodeRef::File(inode) => inode.modtime,
            NodeRef::FileRw(inode) => inode.modtime(),
            NodeRef::Dir(dnode) => dnode.modtime,
            NodeRef::DirRw(dnode) => dnode.modtime(),
        }
    }

    /// Payload length for files, zero for directories.
    pub(crate) fn size(&self) -> u64 {
        match self {
            NodeRef::File(inode) => inode.size(),
            NodeRef::FileRw(inode) => inode.size(),
            NodeRef::Dir(_) | NodeRef::DirRw(_) => 0,
        }
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self, NodeRef::Dir(_) | NodeRef::DirRw(_))
    }

    /// Look up a named entry. Fails `InvalidArgument` on non-directories.
    pub(crate) fn get_entry(&self, name: &str) -> Result<DirEntry, FsError> {
        match self {
            NodeRef::Dir(dnode) => dnode.get_entry(name),
            NodeRef::DirRw(dnode) => dnode.get_entry(name),
            NodeRef::File(_) | NodeRef::FileRw(_) => Err(FsError::InvalidArgument),
        }
    }

    /// Append an entry. Fails `InvalidArgument` on non-directories.
    pub(crate) fn set_entry(&self, entry: DirEntry) -> Result<(), FsError> {
        match self {
            NodeRef::DirRw(dnode) => dnode.set_entry(entry),
            // plain directories are sealed and never mutated
            NodeRef::Dir(_) => Err(FsError::PermissionDenied),
            NodeRef::File(_) | NodeRef::FileRw(_) => Err(FsError::InvalidArgument),
        }
    }

    /// Remove an entry by name. Fails `InvalidArgument` on non-directories.
    pub(crate) fn remove_entry(&self, name: &str) -> Result<(), FsError> {
        match self {
            NodeRef::DirRw(dnode) => dnode.remove_entry(name),
            NodeRef::Dir(_) => Err(FsError::PermissionDenied),
            NodeRef::File(_) | NodeRef::FileRw(_) => Err(FsError::InvalidArgument),
        }
    }

    /// Snapshot the entries of a directory.
    pub(crate) fn entries(&self) -> Result<Vec<DirEntry>, FsError> {
        match self {
            NodeRef::Dir(dnode) => dnode.entries(),
            NodeRef::DirRw(dnode) => dnode.entries(),
            NodeRef::File(_) | NodeRef::FileRw(_) => Err(FsError::InvalidArgument),
        }
    }

    pub(crate) fn has_entries(&self) -> bool {
        match self {
            NodeRef::Dir(dnode) => dnode.has_entries(),
            NodeRef::DirRw(dnode) => dnode.has_entries(),
            NodeRef::File(_) | NodeRef::FileRw(_) => false,
        }
    }

    /// A copy of a file payload. Fails `InvalidArgument` on directories.
    pub(crate) fn bytes(&self) -> Result<Vec<u8>, FsError> {
        match self {
            NodeRef::File(inode) => inode.bytes(),
            NodeRef::FileRw(inode) => inode.bytes(),
            NodeRef::Dir(_) | NodeRef::DirRw(_) => Err(FsError::InvalidArgument),
        }
    }

    /// A file payload as a string (the symlink target). Fails
    /// `InvalidArgument` on directories.
    pub(crate) fn target(&self) -> Result<String, FsError> {
        match self {
            NodeRef::File(inode) => inode.target(),
            NodeRef::FileRw(inode) => inode.target(),
            NodeRef::Dir(_) | NodeRef::DirRw(_) => Err(FsError::InvalidArgument),
        }
    }

    /// Open a handle against this node.
    ///
    /// Files check the requested capabilities against their permission bits;
    /// directories need a read bit and yield a directory handle regardless
    /// of the requested capabilities.
    ///
    /// # Arguments
    /// * `name` - Terminal name the handle reports
    /// * `op_mode` - Capability set granted to the handle
    pub(crate) fn open(&self, name: &str, op_mode: OpMode) -> Result<File, FsError> {
        match self {
            NodeRef::File(inode) => {
                inode.check_open(op_mode)?;
                Ok(File::plain(name, Arc::clone(inode), op_mode))
            }
            NodeRef::FileRw(inode) => {
                inode.check_open(op_mode)?;
                Ok(File::locked(name, Arc::clone(inode), op_mode))
            }
            NodeRef::Dir(dnode) => {
                if !dnode.mode.readable() {
                    return Err(FsError::PermissionDenied);
                }
                Ok(File::dir_plain(name, Arc::clone(dnode)))
            }
            NodeRef::DirRw(dnode) => {
                if !dnode.mode().readable() {
                    return Err(FsError::PermissionDenied);
                }
                Ok(File::dir_locked(name, Arc::clone(dnode)))
            }
        }
    }

    /// Replace permission bits, preserving type bits. Plain nodes are
    /// sealed and unreachable from any mutating facade.
    pub(crate) fn set_mode(&self, perm: FileMode) {
        match self {
            NodeRef::FileRw(inode) => inode.set_mode(perm),
            NodeRef::DirRw(dnode) => dnode.set_mode(perm),
            NodeRef::File(_) | NodeRef::Dir(_) => {}
        }
    }

    /// Replace the modification time. Plain nodes are sealed and
    /// unreachable from any mutating facade.
    pub(crate) fn set_times(&self, mtime: SystemTime) {
        match self {
            NodeRef::FileRw(inode) => inode.set_times(mtime),
            NodeRef::DirRw(dnode) => dnode.set_times(mtime),
            NodeRef::File(_) | NodeRef::Dir(_) => {}
        }
    }
}

/// A named reference to a node within a directory.
///
/// The entry is the sole carrier of a node's name; several entries may
/// reference the same node (a hard link).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub(crate) name: String,
    pub(crate) node: NodeRef,
}

impl DirEntry {
    pub(crate) fn new(name: impl Into<String>, node: NodeRef) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }

    /// The entry's name within its directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stat information for the referenced node.
    pub fn metadata(&self) -> Metadata {
        Metadata::from_node(&self.name, &self.node)
    }

    pub fn is_dir(&self) -> bool {
        self.node.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.node.mode().is_symlink()
    }
}

/// A snapshot of a node's stat information.
#[derive(Debug, Clone)]
pub struct Metadata {
    name: String,
    size: u64,
    mode: FileMode,
    modified: SystemTime,
}

impl Metadata {
    pub(crate) fn from_node(name: &str, node: &NodeRef) -> Self {
        Self {
            name: name.to_string(),
            size: node.size(),
            mode: node.mode(),
            modified: node.modtime(),
        }
    }

    /// The terminal name the node was reached by (`"/"` for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload length in bytes; zero for directories.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Last modification time.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }
}

/// One sealing pass over a mutable tree.
///
/// Sealing is destructive: each wrapper's payload is taken out and the
/// plain node spliced into the owning directory-entry slot. The memo keyed
/// on wrapper identity keeps hard-linked entries pointing at a single
/// sealed node.
#[derive(Default)]
pub(crate) struct Sealer {
    seen: HashMap<usize, NodeRef>,
}

impl Sealer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seal a node, post-order.
    pub(crate) fn seal(&mut self, node: &NodeRef) -> NodeRef {
        match node {
            NodeRef::File(_) | NodeRef::Dir(_) => node.clone(),
            NodeRef::FileRw(inode) => {
                let key: usize = Arc::as_ptr(inode) as usize;
                if let Some(sealed) = self.seen.get(&key) {
                    return sealed.clone();
                }
                let sealed = NodeRef::File(Arc::new(inode.seal_take()));
                self.seen.insert(key, sealed.clone());
                sealed
            }
            NodeRef::DirRw(dnode) => {
                let key: usize = Arc::as_ptr(dnode) as usize;
                if let Some(sealed) = self.seen.get(&key) {
                    return sealed.clone();
                }
                let mut plain: Dnode = dnode.seal_take();
                for entry in &mut plain.entries {
                    entry.node = self.seal(&entry.node);
                }
                let sealed = NodeRef::Dir(Arc::new(plain));
                self.seen.insert(key, sealed.clone());
                sealed
            }
        }
    }
}
