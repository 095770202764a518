//! Foundation types for confstore.
//!
//! confstore keeps the configuration of several independent subsystems in a
//! handful of backing files. Every other confstore crate depends on
//! `confstore-types` for the vocabulary shared between them.
//!
//! # Key Types
//!
//! - [`StoreFileId`] -- Closed set of backing file identifiers
//! - [`StaId`] -- Station selector choosing which files an instance uses
//! - [`DataVersion`] -- Validated envelope format version
//! - [`StoreFileTable`] -- Immutable identifier → file name table
//! - [`CredentialCipher`] -- Opaque per-file encryption collaborator

pub mod cipher;
pub mod error;
pub mod file_id;
pub mod table;
pub mod version;

pub use cipher::{CipherError, CipherFactory, CredentialCipher, EncryptedData};
pub use error::TypeError;
pub use file_id::{StaId, StoreFileId};
pub use table::StoreFileTable;
pub use version::DataVersion;
