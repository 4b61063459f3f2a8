//! Directory nodes.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::error::FsError;
use crate::mode::FileMode;

use super::DirEntry;

/// A directory node: an ordered list of named entries.
///
/// Entries stay in insertion order; new entries always append at the end.
/// Listing requires a read bit, mutation a write bit. `has_entries` is an
/// internal predicate and deliberately skips the permission check.
#[derive(Debug, Clone)]
pub(crate) struct Dnode {
    pub(crate) modtime: SystemTime,
    pub(crate) mode: FileMode,
    pub(crate) entries: Vec<DirEntry>,
}

impl Default for Dnode {
    fn default() -> Self {
        Self {
            modtime: UNIX_EPOCH,
            mode: FileMode::default(),
            entries: Vec::new(),
        }
    }
}

impl Dnode {
    /// Create an empty directory with the given permission bits, stamped
    /// now.
    pub(crate) fn new(perm: FileMode) -> Self {
        Self {
            modtime: SystemTime::now(),
            mode: FileMode::DIR | perm,
            entries: Vec::new(),
        }
    }

    /// Look up an entry by name; requires a read bit.
    pub(crate) fn get_entry(&self, name: &str) -> Result<DirEntry, FsError> {
        if !self.mode.readable() {
            return Err(FsError::PermissionDenied);
        }
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .cloned()
            .ok_or(FsError::NotFound)
    }

    /// Append an entry; requires a write bit. The caller is responsible for
    /// name uniqueness.
    pub(crate) fn set_entry(&mut self, entry: DirEntry) -> Result<(), FsError> {
        if !self.mode.writable() {
            return Err(FsError::PermissionDenied);
        }
        self.entries.push(entry);
        self.modtime = SystemTime::now();
        Ok(())
    }

    /// Remove an entry by name; requires a write bit.
    pub(crate) fn remove_entry(&mut self, name: &str) -> Result<(), FsError> {
        if !self.mode.writable() {
            return Err(FsError::PermissionDenied);
        }
        match self.entries.iter().position(|entry| entry.name == name) {
            Some(pos) => {
                self.entries.remove(pos);
                self.modtime = SystemTime::now();
                Ok(())
            }
            None => Err(FsError::NotFound),
        }
    }

    /// A snapshot of all entries; requires a read bit.
    pub(crate) fn entries(&self) -> Result<Vec<DirEntry>, FsError> {
        if !self.mode.readable() {
            return Err(FsError::PermissionDenied);
        }
        Ok(self.entries.clone())
    }

    pub(crate) fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Replace the permission bits, preserving the directory type bit.
    pub(crate) fn set_mode(&mut self, perm: FileMode) {
        self.mode = FileMode::DIR | perm;
    }

    /// Replace the modification time. Access time is not tracked.
    pub(crate) fn set_times(&mut self, mtime: SystemTime) {
        self.modtime = mtime;
    }
}

/// Mutable wrapper: a [`Dnode`] behind a lock with thread-safe accessors.
#[derive(Debug, Default)]
pub(crate) struct DnodeRw {
    inner: RwLock<Dnode>,
}

impl DnodeRw {
    pub(crate) fn new(perm: FileMode) -> Self {
        Self {
            inner: RwLock::new(Dnode::new(perm)),
        }
    }

    /// The lock directory handles synchronize through.
    pub(crate) fn payload(&self) -> &RwLock<Dnode> {
        &self.inner
    }

    pub(crate) fn get_entry(&self, name: &str) -> Result<DirEntry, FsError> {
        self.inner.read().get_entry(name)
    }

    pub(crate) fn set_entry(&self, entry: DirEntry) -> Result<(), FsError> {
        self.inner.write().set_entry(entry)
    }

    pub(crate) fn remove_entry(&self, name: &str) -> Result<(), FsError> {
        self.inner.write().remove_entry(name)
    }

    pub(crate) fn entries(&self) -> Result<Vec<DirEntry>, FsError> {
        self.inner.read().entries()
    }

    pub(crate) fn has_entries(&self) -> bool {
        self.inner.read().has_entries()
    }

    pub(crate) fn mode(&self) -> FileMode {
        self.inner.read().mode
    }

    pub(crate) fn modtime(&self) -> SystemTime {
        self.inner.read().modtime
    }

    pub(crate) fn set_mode(&self, perm: FileMode) {
        self.inner.write().set_mode(perm);
    }

    pub(crate) fn set_times(&self, mtime: SystemTime) {
        self.inner.write().set_times(mtime);
    }

    /// Take the payload out for sealing, leaving a blank node behind.
    pub(crate) fn seal_take(&self) -> Dnode {
        std::mem::take(&mut *self.inner.write())
    }
}

#[cfg(test)]
mod tests {
    use super::super::NodeRef;
    use super::*;
    use crate::node::file::InodeRw;
    use std::sync::Arc;

    fn file_entry(name: &str) -> DirEntry {
        DirEntry::new(
            name,
            NodeRef::FileRw(Arc::new(InodeRw::new(FileMode::new(0o644), Vec::new()))),
        )
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut dir: Dnode = Dnode::new(FileMode::PERM);
        dir.set_entry(file_entry("b")).unwrap();
        dir.set_entry(file_entry("a")).unwrap();
        dir.set_entry(file_entry("c")).unwrap();

        let names: Vec<String> = dir
            .entries()
            .unwrap()
            .iter()
            .map(|entry| entry.name().to_string())
            .collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn test_get_entry() {
        let mut dir: Dnode = Dnode::new(FileMode::PERM);
        dir.set_entry(file_entry("file.txt")).unwrap();

        assert_eq!(dir.get_entry("file.txt").unwrap().name(), "file.txt");
        assert!(matches!(dir.get_entry("missing"), Err(FsError::NotFound)));
    }

    #[test]
    fn test_unreadable_directory() {
        let mut dir: Dnode = Dnode::new(FileMode::new(0o200));
        dir.set_entry(file_entry("hidden")).unwrap();

        assert!(matches!(
            dir.get_entry("hidden"),
            Err(FsError::PermissionDenied)
        ));
        assert!(matches!(dir.entries(), Err(FsError::PermissionDenied)));
        // the internal predicate skips the permission gate
        assert!(dir.has_entries());
    }

    #[test]
    fn test_unwritable_directory() {
        let mut dir: Dnode = Dnode::new(FileMode::new(0o444));

        assert!(matches!(
            dir.set_entry(file_entry("x")),
            Err(FsError::PermissionDenied)
        ));
        assert!(matches!(
            dir.remove_entry("x"),
            Err(FsError::PermissionDenied)
        ));
    }

    #[test]
    fn test_remove_entry() {
        let mut dir: Dnode = Dnode::new(FileMode::PERM);
        dir.set_entry(file_entry("a")).unwrap();
        dir.set_entry(file_entry("b")).unwrap();

        dir.remove_entry("a").unwrap();
        assert!(matches!(dir.get_entry("a"), Err(FsError::NotFound)));
        assert!(dir.get_entry("b").is_ok());
        assert!(matches!(dir.remove_entry("a"), Err(FsError::NotFound)));
    }

    #[test]
    fn test_set_mode_keeps_dir_bit() {
        let mut dir: Dnode = Dnode::new(FileMode::PERM);
        dir.set_mode(FileMode::new(0o500));
        assert!(dir.mode.is_dir());
        assert_eq!(dir.mode.perm(), FileMode::new(0o500));
    }

    #[test]
    fn test_modtime_updates_on_mutation_only() {
        let mut dir: Dnode = Dnode::new(FileMode::PERM);
        let created: SystemTime = dir.modtime;

        let _ = dir.get_entry("nothing");
        let _ = dir.entries();
        assert_eq!(dir.modtime, created);

        dir.set_entry(file_entry("a")).unwrap();
        assert!(dir.modtime >= created);
    }
}
