//! In-memory [`StoreData`] provider for tests and embedding.
//!
//! Clones share state, so a test keeps one handle and registers another.

use std::sync::{Arc, Mutex};

use confstore_types::{CredentialCipher, DataVersion, StaId, StoreFileId};

use crate::error::ProviderResult;
use crate::provider::StoreData;

/// One `deserialize_data` call as the provider saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub data: Option<Vec<u8>>,
    pub version: Option<DataVersion>,
}

#[derive(Debug, Default)]
struct MemoryState {
    payload: Vec<u8>,
    dirty: bool,
    deliveries: Vec<Delivery>,
    reset_count: usize,
    serialize_count: usize,
}

/// Provider holding one opaque payload.
///
/// The payload is handed to the store as is, so it must be a well-formed
/// markup fragment (plain text without `<` or `&` qualifies).
#[derive(Clone, Debug)]
pub struct InMemoryStoreData {
    name: String,
    file_id: StoreFileId,
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStoreData {
    pub fn new(name: impl Into<String>, file_id: StoreFileId) -> Self {
        Self {
            name: name.into(),
            file_id,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Replace the payload and mark it dirty.
    pub fn set_data(&self, payload: Vec<u8>) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.payload = payload;
        state.dirty = true;
    }

    pub fn data(&self) -> Vec<u8> {
        self.state.lock().expect("lock poisoned").payload.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().expect("lock poisoned").dirty
    }

    /// Every delivery since creation, oldest first.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.state.lock().expect("lock poisoned").deliveries.clone()
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").reset_count
    }

    pub fn serialize_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").serialize_count
    }
}

impl StoreData for InMemoryStoreData {
    fn name(&self) -> &str {
        &self.name
    }

    fn store_file_id(&self, _sta: StaId) -> StoreFileId {
        self.file_id
    }

    fn serialize_data(&mut self, _cipher: Option<&dyn CredentialCipher>) -> ProviderResult<Vec<u8>> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.dirty = false;
        state.serialize_count += 1;
        Ok(state.payload.clone())
    }

    fn deserialize_data(
        &mut self,
        data: Option<&[u8]>,
        version: Option<DataVersion>,
        _cipher: Option<&dyn CredentialCipher>,
    ) -> ProviderResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.payload = data.map(<[u8]>::to_vec).unwrap_or_default();
        state.deliveries.push(Delivery {
            data: data.map(<[u8]>::to_vec),
            version,
        });
        Ok(())
    }

    fn reset_data(&mut self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.payload.clear();
        state.dirty = false;
        state.reset_count += 1;
    }

    fn has_new_data_to_serialize(&self) -> bool {
        self.is_dirty()
    }
}
