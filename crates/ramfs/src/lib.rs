//! In-memory hierarchical filesystem with sealable read-only snapshots.
//!
//! This crate provides a mutable, thread-safe filesystem that lives
//! entirely in memory, with hard links, symlinks, Unix-style permission
//! bits, and a one-way `seal` operation that converts the mutable tree
//! into an immutable one with no synchronization overhead.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: Facades (Fs with a process-wide lock, ReadOnlyFs without)
//! Layer 2: Resolution (path normalisation, bounded symlink expansion)
//! Layer 1: Primitives (node graph, directory entries, open handles)
//! ```
//!
//! # Example
//!
//! ```
//! use ramfs::{FileMode, Fs};
//!
//! let fs = Fs::new();
//! fs.mkdir("/example", FileMode::new(0o700))?;
//!
//! let mut file = fs.create("/example/file.txt")?;
//! file.write_str("Hello, World!")?;
//! file.close()?;
//!
//! assert_eq!(fs.read_file("/example/file.txt")?, b"Hello, World!");
//! # Ok::<(), ramfs::PathError>(())
//! ```

pub mod error;
pub mod fs;
pub mod fs_writable;
pub mod handle;
pub mod mode;
pub mod node;
pub mod options;

mod path;
mod resolve;

pub use error::{FsError, PathError, Result};
pub use fs::ReadOnlyFs;
pub use fs_writable::Fs;
pub use handle::File;
pub use mode::{FileMode, OpenFlags};
pub use node::{DirEntry, Metadata};
pub use options::FsOptions;
