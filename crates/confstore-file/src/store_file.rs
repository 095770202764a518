use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use confstore_types::{CipherFactory, CredentialCipher, StoreFileId, StoreFileTable};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::atomic::AtomicFile;
use crate::error::{FileError, FileResult};

/// What happens to a pending buffer when committing it fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailedWritePolicy {
    /// Drop the buffer, exactly as after a successful commit. The next write
    /// cycle serializes fresh data.
    #[default]
    Discard,
    /// Keep the buffer so the next commit retries it, unless a newer write
    /// replaces it first.
    Retain,
}

/// One physical store file with a single-slot write buffer.
///
/// The buffer is last-write-wins: [`store_raw_data_to_write`] replaces any
/// pending bytes, it never queues them.
///
/// [`store_raw_data_to_write`]: StoreFile::store_raw_data_to_write
pub struct StoreFile {
    file: AtomicFile,
    file_id: StoreFileId,
    cipher: Option<Arc<dyn CredentialCipher>>,
    write_data: Option<Vec<u8>>,
}

impl StoreFile {
    pub fn new(
        path: impl Into<PathBuf>,
        file_id: StoreFileId,
        cipher: Option<Arc<dyn CredentialCipher>>,
    ) -> Self {
        Self {
            file: AtomicFile::new(path),
            file_id,
            cipher,
            write_data: None,
        }
    }

    /// Build the store file for `file_id` under `<base_dir>/<directory_name>`,
    /// creating the directory if needed.
    ///
    /// When `ciphers` is given, the file gets a cipher keyed by its file name.
    pub fn create(
        base_dir: &Path,
        directory_name: &str,
        file_id: StoreFileId,
        table: &StoreFileTable,
        ciphers: Option<&dyn CipherFactory>,
    ) -> FileResult<Self> {
        let file_name = table
            .file_name(file_id)
            .ok_or(FileError::UnknownFileId(file_id))?;
        let dir = base_dir.join(directory_name);
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| FileError::CreateDir {
                path: dir.clone(),
                source,
            })?;
            debug!(dir = %dir.display(), "created store directory");
        }
        let cipher = ciphers.map(|factory| factory.cipher_for(file_name));
        Ok(Self::new(dir.join(file_name), file_id, cipher))
    }

    pub fn file_id(&self) -> StoreFileId {
        self.file_id
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Encryption context handed to this file's providers.
    pub fn cipher(&self) -> Option<&dyn CredentialCipher> {
        self.cipher.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.file.exists()
    }

    /// Committed content, or `None` if the file has never been written.
    pub fn read_raw_data(&self) -> FileResult<Option<Vec<u8>>> {
        self.file.read_fully()
    }

    /// Buffer `data` for the next commit, replacing any pending buffer.
    pub fn store_raw_data_to_write(&mut self, data: Vec<u8>) {
        if self.write_data.replace(data).is_some() {
            debug!(file = %self.file_id, "replaced pending write buffer");
        }
    }

    pub fn has_pending_write(&self) -> bool {
        self.write_data.is_some()
    }

    pub fn pending_write(&self) -> Option<&[u8]> {
        self.write_data.as_deref()
    }

    /// Commit the pending buffer, if any.
    ///
    /// Returns `Ok(false)` when nothing was pending. On failure the committed
    /// content is untouched and `policy` decides whether the buffer survives.
    pub fn write_buffered_raw_data(&mut self, policy: FailedWritePolicy) -> FileResult<bool> {
        let Some(data) = self.write_data.take() else {
            return Ok(false);
        };
        match self.file.write(&data) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(file = %self.file_id, error = %e, ?policy, "store file commit failed");
                if policy == FailedWritePolicy::Retain {
                    self.write_data = Some(data);
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for StoreFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreFile")
            .field("file_id", &self.file_id)
            .field("path", &self.file.path())
            .field("encrypted", &self.cipher.is_some())
            .field("pending_bytes", &self.write_data.as_ref().map(Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confstore_types::{CipherError, EncryptedData};

    #[derive(Debug)]
    struct NamedCipher(String);

    impl CredentialCipher for NamedCipher {
        fn key_alias(&self) -> &str {
            &self.0
        }
        fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, CipherError> {
            Ok(EncryptedData {
                ciphertext: plaintext.to_vec(),
                iv: vec![],
            })
        }
        fn decrypt(&self, data: &EncryptedData) -> Result<Vec<u8>, CipherError> {
            Ok(data.ciphertext.clone())
        }
    }

    struct Factory;

    impl CipherFactory for Factory {
        fn cipher_for(&self, file_name: &str) -> Arc<dyn CredentialCipher> {
            Arc::new(NamedCipher(file_name.to_string()))
        }
    }

    #[test]
    fn buffer_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = StoreFile::new(dir.path().join("a.xml"), StoreFileId::SharedGeneral, None);
        assert!(!file.has_pending_write());
        file.store_raw_data_to_write(b"one".to_vec());
        file.store_raw_data_to_write(b"two".to_vec());
        assert_eq!(file.pending_write(), Some(&b"two"[..]));

        assert!(file.write_buffered_raw_data(FailedWritePolicy::Discard).unwrap());
        assert!(!file.has_pending_write());
        assert_eq!(file.read_raw_data().unwrap().unwrap(), b"two");
    }

    #[test]
    fn flush_without_buffer_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = StoreFile::new(dir.path().join("a.xml"), StoreFileId::SharedGeneral, None);
        assert!(!file.write_buffered_raw_data(FailedWritePolicy::Discard).unwrap());
        assert!(!file.exists());
    }

    #[test]
    fn failed_commit_discards_buffer_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = StoreFile::new(
            dir.path().join("gone").join("a.xml"),
            StoreFileId::UserGeneral,
            None,
        );
        file.store_raw_data_to_write(b"data".to_vec());
        assert!(file.write_buffered_raw_data(FailedWritePolicy::default()).is_err());
        assert!(!file.has_pending_write());
    }

    #[test]
    fn failed_commit_retains_buffer_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later").join("a.xml");
        let mut file = StoreFile::new(&path, StoreFileId::UserGeneral, None);
        file.store_raw_data_to_write(b"data".to_vec());
        assert!(file.write_buffered_raw_data(FailedWritePolicy::Retain).is_err());
        assert_eq!(file.pending_write(), Some(&b"data"[..]));

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        assert!(file.write_buffered_raw_data(FailedWritePolicy::Retain).unwrap());
        assert_eq!(file.read_raw_data().unwrap().unwrap(), b"data");
    }

    #[test]
    fn create_builds_directory_and_cipher() {
        let base = tempfile::tempdir().unwrap();
        let table = StoreFileTable::default();
        let file = StoreFile::create(
            base.path(),
            "confstore",
            StoreFileId::UserNetworkSuggestions,
            &table,
            Some(&Factory),
        )
        .unwrap();
        assert!(base.path().join("confstore").is_dir());
        assert_eq!(
            file.path(),
            base.path()
                .join("confstore")
                .join("ConfigStoreNetworkSuggestions.xml")
        );
        assert_eq!(
            file.cipher().unwrap().key_alias(),
            "ConfigStoreNetworkSuggestions.xml"
        );
    }

    #[test]
    fn create_rejects_id_missing_from_table() {
        let base = tempfile::tempdir().unwrap();
        let table = StoreFileTable::default().without(StoreFileId::UserSecondary);
        let err = StoreFile::create(base.path(), "s", StoreFileId::UserSecondary, &table, None)
            .unwrap_err();
        assert!(matches!(err, FileError::UnknownFileId(StoreFileId::UserSecondary)));
    }

    #[test]
    fn policy_serde() {
        assert_eq!(
            serde_json::to_string(&FailedWritePolicy::Retain).unwrap(),
            "\"retain\""
        );
        assert_eq!(FailedWritePolicy::default(), FailedWritePolicy::Discard);
    }
}
