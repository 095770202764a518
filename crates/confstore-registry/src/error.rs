use confstore_envelope::EnvelopeError;
use confstore_types::{CipherError, StoreFileId};

/// Failure reported by a provider hook.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The section content could not be interpreted.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// Parsing the section content with the markup reader failed.
    #[error(transparent)]
    Markup(#[from] EnvelopeError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("{0}")]
    Other(String),
}

/// Result alias for provider hooks.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from registration and per-file dispatch.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The provider's name cannot be used as a section tag.
    #[error("store data name {0:?} is not a valid section name")]
    InvalidName(String),

    /// The provider targets a file id that is not in the file table.
    #[error("store data '{name}' targets unknown store file {file_id}")]
    UnknownStoreFile { name: String, file_id: StoreFileId },

    /// A provider with this section name is already registered.
    #[error("store data '{0}' is already registered")]
    DuplicateStoreData(String),

    /// The file holds a section no registered provider owns.
    #[error("unknown store data '{section}' in {file_id}; registered: {known:?}")]
    UnknownSection {
        file_id: StoreFileId,
        section: String,
        known: Vec<String>,
    },

    /// The file holds the same section more than once.
    #[error("duplicate store data '{section}' in {file_id}")]
    DuplicateSection { file_id: StoreFileId, section: String },

    /// The file is not a valid envelope, or an envelope could not be built.
    #[error("envelope error in {file_id}: {source}")]
    Envelope {
        file_id: StoreFileId,
        source: EnvelopeError,
    },

    /// A provider hook failed.
    #[error("store data '{name}' failed: {source}")]
    Provider { name: String, source: ProviderError },
}

impl RegistryError {
    /// Returns `true` for errors caused by the content of a file, as opposed
    /// to registration mistakes or provider failures.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownSection { .. }
                | RegistryError::DuplicateSection { .. }
                | RegistryError::Envelope { .. }
        )
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
