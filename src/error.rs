//! Error types for stegoloop.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for stegoloop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stegoloop operations.
///
/// Every failure in the crate falls into one of four kinds. At the FUSE
/// boundary they are all collapsed to `EIO`; the distinction exists for
/// logging and for callers of the library API.
#[derive(Error, Debug)]
pub enum Error {
    /// A precondition violation, such as an out-of-range offset. If one of
    /// these reaches an end user, there is a bug somewhere.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any failure reading, writing, decoding, encoding or enumerating
    /// on-disk files, including the "file has changed" guard and
    /// unsupported image formats.
    #[error("{0}")]
    BackingStore(String),

    /// Allocating a region's buffer failed, typically because the total
    /// cover capacity exceeds available memory.
    #[error("could not allocate {size} bytes to cache '{path}'")]
    TooBig { path: PathBuf, size: usize },

    /// Reserved for operations that are intentionally left unimplemented.
    #[error("`{0}`: not implemented")]
    Unimplemented(&'static str),
}

impl Error {
    /// A `BackingStore` error carrying the offending path and an I/O cause.
    pub fn io(path: &Path, what: &str, err: std::io::Error) -> Self {
        Error::BackingStore(format!("could not {} '{}': {}", what, path.display(), err))
    }

    /// The change-detection guard: the file on disk no longer matches what
    /// was recorded at construction.
    pub fn changed(path: &Path) -> Self {
        Error::BackingStore(format!("file '{}' has changed", path.display()))
    }

    /// True if this is the change-detection guard error.
    pub fn is_changed(&self) -> bool {
        matches!(self, Error::BackingStore(msg) if msg.ends_with("has changed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_guard_is_recognizable() {
        let err = Error::changed(Path::new("/tmp/cover.png"));
        assert!(err.is_changed());
        assert!(err.to_string().contains("/tmp/cover.png"));
    }

    #[test]
    fn io_error_carries_path_and_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io(Path::new("a.png"), "write image to", cause);
        let msg = err.to_string();
        assert!(msg.contains("a.png"));
        assert!(msg.contains("denied"));
        assert!(!err.is_changed());
    }
}
