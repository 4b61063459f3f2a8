//! The read-only filesystem view.
//!
//! [`ReadOnlyFs`] wraps a sealed node tree and serves lookups without any
//! locking. The shared operation core ([`FsCore`]) is reused by the
//! read-write facade, which adds the process-wide lock discipline on top.

use crate::error::{FsError, PathError, Result};
use crate::handle::File;
use crate::mode::OpMode;
use crate::node::{DirEntry, Metadata, NodeRef};
use crate::resolve::{resolve, resolve_entry};

/// Shared read-side operations over a root node.
///
/// Methods return bare error kinds; the owning facade attaches the
/// `{op, path}` envelope.
#[derive(Debug, Clone)]
pub(crate) struct FsCore {
    pub(crate) root: NodeRef,
}

impl FsCore {
    /// Resolve and open with the read and seek capabilities.
    pub(crate) fn open(&self, path: &str) -> Result<File, FsError> {
        let node: NodeRef = resolve(&self.root, path)?;
        node.open(terminal_name(path), OpMode::READ | OpMode::SEEK)
    }

    /// Resolve to a directory and snapshot its entries.
    pub(crate) fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let node: NodeRef = resolve(&self.root, path)?;
        if !node.is_dir() {
            return Err(FsError::InvalidArgument);
        }
        node.entries()
    }

    /// Resolve to a file and return a copy of its contents.
    pub(crate) fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let node: NodeRef = resolve(&self.root, path)?;
        node.bytes()
    }

    /// Stat the terminal node, following symlinks.
    pub(crate) fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        let node: NodeRef = resolve(&self.root, path)?;
        Ok(Metadata::from_node(terminal_name(path), &node))
    }

    /// Stat the terminal entry itself, without following a terminal
    /// symlink.
    pub(crate) fn lstat(&self, path: &str) -> Result<Metadata, FsError> {
        let entry: DirEntry = resolve_entry(&self.root, path)?;
        Ok(entry.metadata())
    }

    /// Read a symlink's target. Fails `InvalidArgument` on anything that is
    /// not a symlink.
    pub(crate) fn read_link(&self, path: &str) -> Result<String, FsError> {
        let entry: DirEntry = resolve_entry(&self.root, path)?;
        if !entry.node.mode().is_symlink() {
            return Err(FsError::InvalidArgument);
        }
        entry.node.target()
    }

    /// Resolve to a directory to use as a new root.
    pub(crate) fn sub_root(&self, path: &str) -> Result<NodeRef, FsError> {
        let node: NodeRef = resolve(&self.root, path)?;
        if !node.is_dir() {
            return Err(FsError::InvalidArgument);
        }
        Ok(node)
    }
}

/// The terminal name of a path, `"/"` for the root.
fn terminal_name(path: &str) -> &str {
    let name: &str = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path);
    match name {
        "" | "." => "/",
        _ => name,
    }
}

/// An immutable filesystem over a sealed node tree.
///
/// Produced by [`Fs::seal`](crate::Fs::seal). Every operation is lock-free;
/// the tree can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct ReadOnlyFs {
    core: FsCore,
}

impl ReadOnlyFs {
    pub(crate) fn from_root(root: NodeRef) -> Self {
        Self {
            core: FsCore { root },
        }
    }

    /// Open the file at `path` for reading and seeking, following
    /// symlinks. Opening a directory yields a directory handle.
    pub fn open(&self, path: &str) -> Result<File> {
        self.core
            .open(path)
            .map_err(|err| PathError::new("open", path, err))
    }

    /// Snapshot the entries of the directory at `path`.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.core
            .read_dir(path)
            .map_err(|err| PathError::new("readdir", path, err))
    }

    /// A copy of the contents of the file at `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.core
            .read_file(path)
            .map_err(|err| PathError::new("readfile", path, err))
    }

    /// Stat the node at `path`, following symlinks.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        self.core
            .stat(path)
            .map_err(|err| PathError::new("stat", path, err))
    }

    /// Stat the entry at `path` without following a terminal symlink.
    pub fn lstat(&self, path: &str) -> Result<Metadata> {
        self.core
            .lstat(path)
            .map_err(|err| PathError::new("lstat", path, err))
    }

    /// The target of the symlink at `path`.
    pub fn read_link(&self, path: &str) -> Result<String> {
        self.core
            .read_link(path)
            .map_err(|err| PathError::new("readlink", path, err))
    }

    /// A new read-only view rooted at the directory at `path`.
    pub fn sub(&self, path: &str) -> Result<ReadOnlyFs> {
        let root: NodeRef = self
            .core
            .sub_root(path)
            .map_err(|err| PathError::new("sub", path, err))?;
        Ok(ReadOnlyFs::from_root(root))
    }
}
