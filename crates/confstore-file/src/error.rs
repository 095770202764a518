use std::io;
use std::path::PathBuf;

use confstore_types::StoreFileId;

/// Errors from store file operations.
///
/// A missing file is not an error: reads report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// Reading the backing file failed for a reason other than absence.
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The atomic replace failed. The previously committed content is intact.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The store directory could not be created.
    #[error("failed to create store directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// The path has no file name component.
    #[error("invalid store file path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// The file table has no entry for the identifier.
    #[error("no file name configured for {0}")]
    UnknownFileId(StoreFileId),
}

/// Result alias for file operations.
pub type FileResult<T> = Result<T, FileError>;
