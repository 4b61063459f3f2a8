//! Path resolution with symlink expansion.
//!
//! The resolver walks a root-relative path against a node tree, expanding
//! symlinks as it meets them. Expansion restarts the walk from the root on
//! a rejoined path, so a chain of links costs one redirect per hop; the
//! descending redirect budget bounds cycles without tracking visited nodes
//! (the same component may legitimately appear twice along a chain).

use crate::error::FsError;
use crate::node::{DirEntry, NodeRef};
use crate::path;

/// Initial redirect budget for one resolution.
pub(crate) const MAX_REDIRECTS: u8 = 255;

/// Caller policy for the terminal entry of a with-parent resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Existence {
    MustNotExist,
    MustExist,
    DoesntMatter,
}

/// Resolve a path to its terminal node, following symlinks everywhere,
/// including the terminal component.
///
/// # Arguments
/// * `root` - Directory node the walk starts from
/// * `path` - Slash-delimited path, absolute or root-relative
///
/// # Returns
/// The terminal node reference.
pub(crate) fn resolve(root: &NodeRef, path: &str) -> Result<NodeRef, FsError> {
    let mut remaining: String = path::normalize(path);
    let mut consumed: String = String::new();
    let mut redirects: u8 = MAX_REDIRECTS;
    let mut current: NodeRef = root.clone();

    while !remaining.is_empty() {
        if !current.mode().readable() {
            return Err(FsError::PermissionDenied);
        }

        let (name, rest): (String, String) = match remaining.find('/') {
            Some(pos) => (remaining[..pos].to_string(), remaining[pos + 1..].to_string()),
            None => (remaining, String::new()),
        };
        remaining = rest;

        let entry: DirEntry = current.get_entry(&name)?;

        if !entry.node.mode().is_symlink() {
            if !consumed.is_empty() {
                consumed.push('/');
            }
            consumed.push_str(&name);
            current = entry.node;
            continue;
        }

        redirects -= 1;
        if redirects == 0 {
            return Err(FsError::InvalidArgument);
        }

        let target: String = entry.node.target()?;
        let rejoined: String = match target.strip_prefix('/') {
            Some(absolute) => format!("{absolute}/{remaining}"),
            None => format!("{consumed}/{target}/{remaining}"),
        };

        remaining = path::normalize(&rejoined);
        consumed.clear();
        current = root.clone();
    }

    Ok(current)
}

/// Resolve a path to its terminal entry without following a terminal
/// symlink. Intermediate symlinks still expand. The root resolves to a
/// synthetic entry named `/`.
pub(crate) fn resolve_entry(root: &NodeRef, path: &str) -> Result<DirEntry, FsError> {
    let normalized: String = path::normalize(path);
    if normalized.is_empty() {
        return Ok(DirEntry::new("/", root.clone()));
    }

    let (dir, name): (&str, &str) = path::split(&normalized);
    let parent: NodeRef = resolve(root, dir)?;

    parent.get_entry(name)
}

/// Resolve a path to its parent directory and terminal entry, applying an
/// existence policy to the terminal.
///
/// Returns the parent node, the entry when present, and the terminal name.
/// Fails `InvalidArgument` when the path has no terminal name or the parent
/// is not a directory.
pub(crate) fn resolve_with_parent(
    root: &NodeRef,
    path: &str,
    policy: Existence,
) -> Result<(NodeRef, Option<DirEntry>, String), FsError> {
    let normalized: String = path::normalize(path);
    let (dir, name): (&str, &str) = path::split(&normalized);
    if name.is_empty() {
        return Err(FsError::InvalidArgument);
    }

    let parent: NodeRef = resolve(root, dir)?;
    if !parent.is_dir() {
        return Err(FsError::InvalidArgument);
    }

    match parent.get_entry(name) {
        Ok(entry) => match policy {
            Existence::MustNotExist => Err(FsError::AlreadyExists),
            Existence::MustExist | Existence::DoesntMatter => {
                Ok((parent, Some(entry), name.to_string()))
            }
        },
        Err(FsError::NotFound) => match policy {
            Existence::MustExist => Err(FsError::NotFound),
            Existence::MustNotExist | Existence::DoesntMatter => {
                Ok((parent, None, name.to_string()))
            }
        },
        Err(err) => Err(err),
    }
}
