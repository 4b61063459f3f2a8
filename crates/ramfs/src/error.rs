//! Error types for filesystem and handle operations.

use std::io;

use thiserror::Error;

/// The kind of failure produced by a filesystem or handle operation.
#[derive(Debug, Error)]
pub enum FsError {
    /// No entry with the requested name exists.
    #[error("file does not exist")]
    NotFound,

    /// An entry with the requested name already exists.
    #[error("file already exists")]
    AlreadyExists,

    /// A permission bit required by the operation is missing on the node
    /// or one of its parents.
    #[error("permission denied")]
    PermissionDenied,

    /// The operation does not apply to its target: an empty terminal name,
    /// a non-directory in directory position, a missing handle capability,
    /// a symlink chain past the redirect limit, and similar misuse.
    #[error("invalid argument")]
    InvalidArgument,

    /// The handle was already closed.
    #[error("file already closed")]
    Closed,

    /// A read reached the end of the data.
    #[error("end of file")]
    Eof,

    /// An error surfaced by an external reader or writer.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Error envelope produced at every facade and handle entry point.
///
/// `op` is the operation tag (`"open"`, `"mkdir"`, ...), `path` the caller's
/// original path string (or the handle's name), and `source` the underlying
/// failure kind.
#[derive(Debug, Error)]
#[error("{op} {path}: {source}")]
pub struct PathError {
    /// Operation tag.
    pub op: &'static str,
    /// The path or handle name the operation was invoked with.
    pub path: String,
    /// The underlying failure.
    #[source]
    pub source: FsError,
}

impl PathError {
    /// Wrap a failure kind with the operation and path it occurred on.
    pub(crate) fn new(op: &'static str, path: impl Into<String>, source: FsError) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }
}

impl From<PathError> for io::Error {
    fn from(err: PathError) -> Self {
        let kind: io::ErrorKind = match err.source {
            FsError::NotFound => io::ErrorKind::NotFound,
            FsError::AlreadyExists => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied => io::ErrorKind::PermissionDenied,
            FsError::InvalidArgument => io::ErrorKind::InvalidInput,
            FsError::Closed => io::ErrorKind::Other,
            FsError::Eof => io::ErrorKind::UnexpectedEof,
            FsError::Io(ref inner) => inner.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// Convenience alias for fallible filesystem operations.
pub type Result<T, E = PathError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_display() {
        let err: PathError = PathError::new("open", "/a/b", FsError::PermissionDenied);
        assert_eq!(err.to_string(), "open /a/b: permission denied");
    }

    #[test]
    fn test_path_error_source_chain() {
        let err: PathError = PathError::new("mkdir", "/x", FsError::AlreadyExists);
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert_eq!(source.map(|s| s.to_string()).as_deref(), Some("file already exists"));
    }

    #[test]
    fn test_io_error_kind_mapping() {
        let err: PathError = PathError::new("readfile", "/missing", FsError::NotFound);
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let err: PathError = PathError::new("read", "f", FsError::Eof);
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
