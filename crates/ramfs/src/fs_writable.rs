//! The read-write filesystem.
//!
//! [`Fs`] wraps a mutable node tree behind one process-wide read-write
//! lock: structural mutators hold it exclusively for their whole duration,
//! read-side operations hold it shared. Mode and time changes go through
//! the shared side and rely on the per-node locks. Sub-views share the
//! process-wide lock of the filesystem they were carved from.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::error::{FsError, PathError, Result};
use crate::fs::{FsCore, ReadOnlyFs};
use crate::handle::File;
use crate::mode::{FileMode, OpMode, OpenFlags};
use crate::node::{DirEntry, DnodeRw, InodeRw, Metadata, NodeRef, Sealer};
use crate::options::FsOptions;
use crate::path;
use crate::resolve::{resolve, resolve_entry, resolve_with_parent, Existence};

/// Default permission bits for files created by [`Fs::create`].
const DEFAULT_FILE_PERM: FileMode = FileMode::new(0o666);

/// A mutable in-memory filesystem.
///
/// All methods take `&self`; the filesystem can be shared across threads
/// behind an `Arc`. [`Fs::seal`] consumes the filesystem and converts it
/// into a lock-free [`ReadOnlyFs`], destroying the mutable tree in the
/// process.
#[derive(Debug)]
pub struct Fs {
    core: FsCore,
    lock: Arc<RwLock<()>>,
}

impl Fs {
    /// An empty filesystem with a `0o777` root.
    pub fn new() -> Self {
        Self::with_options(FsOptions::default())
    }

    /// An empty filesystem configured by `options`.
    pub fn with_options(options: FsOptions) -> Self {
        Self {
            core: FsCore {
                root: NodeRef::DirRw(Arc::new(DnodeRw::new(options.root_perm))),
            },
            lock: Arc::new(RwLock::new(())),
        }
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// Open the file at `path` for reading and seeking, following
    /// symlinks. Opening a directory yields a directory handle.
    pub fn open(&self, path: &str) -> Result<File> {
        let _guard = self.lock.read();
        self.core
            .open(path)
            .map_err(|err| PathError::new("open", path, err))
    }

    /// Snapshot the entries of the directory at `path`.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let _guard = self.lock.read();
        self.core
            .read_dir(path)
            .map_err(|err| PathError::new("readdir", path, err))
    }

    /// A copy of the contents of the file at `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let _guard = self.lock.read();
        self.core
            .read_file(path)
            .map_err(|err| PathError::new("readfile", path, err))
    }

    /// Stat the node at `path`, following symlinks.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let _guard = self.lock.read();
        self.core
            .stat(path)
            .map_err(|err| PathError::new("stat", path, err))
    }

    /// Stat the entry at `path` without following a terminal symlink.
    pub fn lstat(&self, path: &str) -> Result<Metadata> {
        let _guard = self.lock.read();
        self.core
            .lstat(path)
            .map_err(|err| PathError::new("lstat", path, err))
    }

    /// The target of the symlink at `path`.
    pub fn read_link(&self, path: &str) -> Result<String> {
        let _guard = self.lock.read();
        self.core
            .read_link(path)
            .map_err(|err| PathError::new("readlink", path, err))
    }

    /// A new filesystem view rooted at the directory at `path`, sharing
    /// this filesystem's process-wide lock.
    pub fn sub(&self, path: &str) -> Result<Fs> {
        let _guard = self.lock.read();
        let root: NodeRef = self
            .core
            .sub_root(path)
            .map_err(|err| PathError::new("sub", path, err))?;
        Ok(Fs {
            core: FsCore { root },
            lock: Arc::clone(&self.lock),
        })
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Create an empty directory at `path` with permission bits `perm`.
    pub fn mkdir(&self, path: &str, perm: FileMode) -> Result<()> {
        let _guard = self.lock.write();
        self.mkdir_locked(path, perm)
            .map_err(|err| PathError::new("mkdir", path, err))
    }

    fn mkdir_locked(&self, path: &str, perm: FileMode) -> Result<(), FsError> {
        let (parent, _, name) =
            resolve_with_parent(&self.core.root, path, Existence::MustNotExist)?;
        parent.set_entry(DirEntry::new(
            name,
            NodeRef::DirRw(Arc::new(DnodeRw::new(perm))),
        ))?;
        tracing::debug!("created directory {}", path);
        Ok(())
    }

    /// Create the directory at `path` and every missing parent. Existing
    /// components are left alone; an intermediate non-directory fails
    /// `InvalidArgument`.
    pub fn mkdir_all(&self, path: &str, perm: FileMode) -> Result<()> {
        let _guard = self.lock.write();
        let normalized: String = path::normalize(path);
        let mut prefix: String = String::new();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            match self.mkdir_locked(&prefix, perm) {
                Ok(()) | Err(FsError::AlreadyExists) => {}
                Err(err) => return Err(PathError::new("mkdirall", path, err)),
            }
        }
        Ok(())
    }

    /// Open the file at `path` read-write, creating it if absent and
    /// truncating it if present.
    pub fn create(&self, path: &str) -> Result<File> {
        self.open_file_tagged(
            "create",
            path,
            OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            DEFAULT_FILE_PERM,
        )
    }

    /// Open the file at `path` according to `flags`.
    ///
    /// # Arguments
    /// * `path` - File path
    /// * `flags` - Existence policy, capability and post-open modifiers
    /// * `perm` - Permission bits for a newly created file
    ///
    /// # Returns
    /// A handle whose capability set follows the read/write flags; always
    /// seekable.
    pub fn open_file(&self, path: &str, flags: OpenFlags, perm: FileMode) -> Result<File> {
        self.open_file_tagged("openfile", path, flags, perm)
    }

    fn open_file_tagged(
        &self,
        op: &'static str,
        path: &str,
        flags: OpenFlags,
        perm: FileMode,
    ) -> Result<File> {
        let _guard = self.lock.write();
        self.open_or_create(path, flags, perm)
            .map_err(|err| PathError::new(op, path, err))
    }

    fn open_or_create(
        &self,
        path: &str,
        flags: OpenFlags,
        perm: FileMode,
    ) -> Result<File, FsError> {
        let (parent, existing, name) =
            resolve_with_parent(&self.core.root, path, existence_policy(flags))?;

        let entry: DirEntry = match existing {
            Some(entry) => entry,
            None => {
                let entry = DirEntry::new(
                    name.clone(),
                    NodeRef::FileRw(Arc::new(InodeRw::new(perm, Vec::new()))),
                );
                parent.set_entry(entry.clone())?;
                entry
            }
        };

        let mut file: File = entry.node.open(&name, open_capabilities(flags))?;
        if file.is_dir() {
            return Err(FsError::InvalidArgument);
        }
        file.apply_open_flags(flags)?;
        Ok(file)
    }

    /// Add a second name for the file at `old_path`. The two entries share
    /// one underlying node. Directories cannot be linked.
    pub fn link(&self, old_path: &str, new_path: &str) -> Result<()> {
        let _guard = self.lock.write();
        let entry: DirEntry = resolve_entry(&self.core.root, old_path)
            .map_err(|err| PathError::new("link", old_path, err))?;
        if entry.node.is_dir() {
            return Err(PathError::new("link", old_path, FsError::InvalidArgument));
        }
        let (parent, _, name) =
            resolve_with_parent(&self.core.root, new_path, Existence::MustNotExist)
                .map_err(|err| PathError::new("link", new_path, err))?;
        parent
            .set_entry(DirEntry::new(name, entry.node))
            .map_err(|err| PathError::new("link", new_path, err))
    }

    /// Create a symlink at `link_path` pointing at `target`. The target is
    /// stored lexically cleaned and is not required to exist.
    pub fn symlink(&self, target: &str, link_path: &str) -> Result<()> {
        let _guard = self.lock.write();
        self.symlink_locked(target, link_path)
            .map_err(|err| PathError::new("symlink", link_path, err))
    }

    fn symlink_locked(&self, target: &str, link_path: &str) -> Result<(), FsError> {
        let (parent, _, name) =
            resolve_with_parent(&self.core.root, link_path, Existence::MustNotExist)?;
        let node = NodeRef::FileRw(Arc::new(InodeRw::new(
            FileMode::SYMLINK | FileMode::PERM,
            path::clean(target).into_bytes(),
        )));
        parent.set_entry(DirEntry::new(name, node))?;
        tracing::debug!("created symlink {} -> {}", link_path, target);
        Ok(())
    }

    /// Move the entry at `old_path` to `new_path`. The destination must
    /// not exist and its parent must be writable; the entry keeps its node
    /// and appends at the end of the destination directory.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let _guard = self.lock.write();
        let (old_parent, old_entry, _) =
            resolve_with_parent(&self.core.root, old_path, Existence::MustExist)
                .map_err(|err| PathError::new("rename", old_path, err))?;
        let old_entry: DirEntry = old_entry
            .ok_or(FsError::NotFound)
            .map_err(|err| PathError::new("rename", old_path, err))?;
        let (new_parent, _, new_name) =
            resolve_with_parent(&self.core.root, new_path, Existence::MustNotExist)
                .map_err(|err| PathError::new("rename", new_path, err))?;
        if !new_parent.mode().writable() {
            return Err(PathError::new(
                "rename",
                new_path,
                FsError::PermissionDenied,
            ));
        }
        old_parent
            .remove_entry(&old_entry.name)
            .map_err(|err| PathError::new("rename", new_path, err))?;
        new_parent
            .set_entry(DirEntry::new(new_name, old_entry.node))
            .map_err(|err| PathError::new("rename", new_path, err))?;
        tracing::debug!("renamed {} -> {}", old_path, new_path);
        Ok(())
    }

    /// Unlink the entry at `path`. A directory must be empty.
    pub fn remove(&self, path: &str) -> Result<()> {
        let _guard = self.lock.write();
        self.remove_locked(path)
            .map_err(|err| PathError::new("remove", path, err))
    }

    fn remove_locked(&self, path: &str) -> Result<(), FsError> {
        let (parent, entry, _) =
            resolve_with_parent(&self.core.root, path, Existence::MustExist)?;
        let entry: DirEntry = entry.ok_or(FsError::NotFound)?;
        if entry.node.is_dir() && entry.node.has_entries() {
            return Err(FsError::InvalidArgument);
        }
        parent.remove_entry(&entry.name)
    }

    /// Unlink the entry at `path` and everything below it, by reference.
    /// Succeeds when the entry is already absent; errors resolving the
    /// parent still surface.
    pub fn remove_all(&self, path: &str) -> Result<()> {
        let _guard = self.lock.write();
        self.remove_all_locked(path)
            .map_err(|err| PathError::new("removeall", path, err))
    }

    fn remove_all_locked(&self, path: &str) -> Result<(), FsError> {
        let normalized: String = path::normalize(path);
        let (dir, name): (&str, &str) = path::split(&normalized);
        if name.is_empty() {
            // the root entry is never deletable
            return Err(FsError::InvalidArgument);
        }
        let parent: NodeRef = resolve(&self.core.root, dir)?;
        if !parent.is_dir() {
            return Err(FsError::InvalidArgument);
        }
        match parent.remove_entry(name) {
            Ok(()) => {
                tracing::debug!("removed subtree {}", path);
                Ok(())
            }
            Err(FsError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Replace the permission bits of the node at `path`, following
    /// symlinks. Type bits are preserved.
    pub fn chmod(&self, path: &str, mode: FileMode) -> Result<()> {
        let _guard = self.lock.read();
        let node: NodeRef = resolve(&self.core.root, path)
            .map_err(|err| PathError::new("chmod", path, err))?;
        node.set_mode(mode.perm());
        Ok(())
    }

    /// Replace the modification time of the node at `path`, following
    /// symlinks. The access time is accepted and ignored.
    pub fn chtimes(&self, path: &str, _atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let _guard = self.lock.read();
        let node: NodeRef = resolve(&self.core.root, path)
            .map_err(|err| PathError::new("chtimes", path, err))?;
        node.set_times(mtime);
        Ok(())
    }

    /// [`chtimes`](Fs::chtimes) without following a terminal symlink.
    pub fn lchtimes(&self, path: &str, _atime: SystemTime, mtime: SystemTime) -> Result<()> {
        let _guard = self.lock.read();
        let entry: DirEntry = resolve_entry(&self.core.root, path)
            .map_err(|err| PathError::new("lchtimes", path, err))?;
        entry.node.set_times(mtime);
        Ok(())
    }

    /// Probe the node at `path`, following symlinks. Ownership is not
    /// tracked; the ids are accepted and ignored.
    pub fn chown(&self, path: &str, _uid: u32, _gid: u32) -> Result<()> {
        let _guard = self.lock.read();
        resolve(&self.core.root, path)
            .map(|_| ())
            .map_err(|err| PathError::new("chown", path, err))
    }

    /// [`chown`](Fs::chown) without following a terminal symlink.
    pub fn lchown(&self, path: &str, _uid: u32, _gid: u32) -> Result<()> {
        let _guard = self.lock.read();
        resolve_entry(&self.core.root, path)
            .map(|_| ())
            .map_err(|err| PathError::new("lchown", path, err))
    }

    /// Convert this filesystem into a lock-free read-only one.
    ///
    /// Sealing reuses the underlying node storage instead of copying it,
    /// destroying the mutable tree: sub-views carved from this filesystem
    /// and handles opened before sealing observe blank nodes afterwards.
    /// Everything visible before the call is visible through the returned
    /// view.
    pub fn seal(self) -> ReadOnlyFs {
        let guard = self.lock.write();
        let root: NodeRef = Sealer::new().seal(&self.core.root);
        drop(guard);
        tracing::debug!("sealed filesystem");
        ReadOnlyFs::from_root(root)
    }
}

impl Default for Fs {
    fn default() -> Self {
        Self::new()
    }
}

/// The terminal-existence policy implied by a flag set.
fn existence_policy(flags: OpenFlags) -> Existence {
    if flags.contains(OpenFlags::EXCL) {
        Existence::MustNotExist
    } else if flags.contains(OpenFlags::CREATE) {
        Existence::DoesntMatter
    } else {
        Existence::MustExist
    }
}

/// The handle capability set implied by a flag set: always seekable, with
/// read and write following their flags.
fn open_capabilities(flags: OpenFlags) -> OpMode {
    let mut capabilities: OpMode = OpMode::SEEK;
    if flags.contains(OpenFlags::READ_ONLY) {
        capabilities = capabilities | OpMode::READ;
    }
    if flags.contains(OpenFlags::WRITE_ONLY) {
        capabilities = capabilities | OpMode::WRITE;
    }
    capabilities
}
