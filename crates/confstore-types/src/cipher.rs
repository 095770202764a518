//! Interface of the credential encryption collaborator.
//!
//! The store never calls a cipher itself. A cipher is attached to a store
//! file and handed to that file's providers unchanged, so they can encrypt
//! the credential fields of their own payloads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Ciphertext with the initialization vector it was produced with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Failure reported by a cipher implementation.
#[derive(Debug, thiserror::Error)]
#[error("cipher '{key_alias}' failed: {message}")]
pub struct CipherError {
    pub key_alias: String,
    pub message: String,
}

impl CipherError {
    pub fn new(key_alias: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key_alias: key_alias.into(),
            message: message.into(),
        }
    }
}

/// Per-file encryption context.
pub trait CredentialCipher: fmt::Debug + Send + Sync {
    /// Alias of the key this cipher uses (usually derived from the file name).
    fn key_alias(&self) -> &str;

    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, CipherError>;

    fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, CipherError>;
}

/// Builds the cipher attached to a store file when credential encryption
/// is enabled.
pub trait CipherFactory {
    fn cipher_for(&self, file_name: &str) -> Arc<dyn CredentialCipher>;
}
