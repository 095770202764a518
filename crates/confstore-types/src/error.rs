use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid data version {version}: supported range is [{min}, {max}]")]
    InvalidVersion { version: i64, min: u32, max: u32 },

    #[error("unknown store file id: {0}")]
    UnknownFileId(String),

    #[error("unknown station id: {0}")]
    UnknownStaId(String),
}
