//! Filesystem construction options.

use crate::mode::FileMode;

/// Options for constructing a mutable filesystem.
///
/// # Example
///
/// ```
/// use ramfs::{Fs, FsOptions, FileMode};
///
/// let fs = Fs::with_options(FsOptions::new().with_root_perm(FileMode::new(0o755)));
/// assert_eq!(fs.stat("/").unwrap().mode().perm(), FileMode::new(0o755));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FsOptions {
    /// Permission bits applied to the root directory.
    pub root_perm: FileMode,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            root_perm: FileMode::PERM,
        }
    }
}

impl FsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permission bits of the root directory.
    pub fn with_root_perm(mut self, perm: FileMode) -> Self {
        self.root_perm = perm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_perm() {
        assert_eq!(FsOptions::default().root_perm, FileMode::PERM);
    }

    #[test]
    fn test_with_root_perm() {
        let options: FsOptions = FsOptions::new().with_root_perm(FileMode::new(0o500));
        assert_eq!(options.root_perm, FileMode::new(0o500));
    }
}
