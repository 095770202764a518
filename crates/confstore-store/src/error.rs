use std::io;
use std::path::PathBuf;

use confstore_file::FileError;
use confstore_registry::RegistryError;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    File(#[from] FileError),

    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to encode config: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
}

impl StoreError {
    /// Returns `true` if a store file's content could not be parsed.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, StoreError::Registry(e) if e.is_parse_error())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
