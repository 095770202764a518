use std::fmt;

use confstore_envelope::xml;
use confstore_types::{StaId, StoreFileId, StoreFileTable};
use tracing::{debug, error};

use crate::error::{RegistryError, RegistryResult};
use crate::provider::StoreData;

/// One registered provider together with the file it was routed to.
pub struct Registration {
    pub(crate) name: String,
    pub(crate) file_id: StoreFileId,
    pub(crate) provider: Box<dyn StoreData>,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_id(&self) -> StoreFileId {
        self.file_id
    }

    pub fn has_new_data(&self) -> bool {
        self.provider.has_new_data_to_serialize()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("file_id", &self.file_id)
            .finish()
    }
}

/// Providers of one store instance, in registration order.
///
/// Registrations live as long as the registry; there is no unregister.
pub struct StoreDataRegistry {
    sta_id: StaId,
    table: StoreFileTable,
    pub(crate) entries: Vec<Registration>,
    pub(crate) verbose: bool,
}

impl StoreDataRegistry {
    pub fn new(sta_id: StaId, table: StoreFileTable) -> Self {
        Self {
            sta_id,
            table,
            entries: Vec::new(),
            verbose: false,
        }
    }

    pub fn sta_id(&self) -> StaId {
        self.sta_id
    }

    pub fn table(&self) -> &StoreFileTable {
        &self.table
    }

    /// Log every provider invocation at debug level.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Register a provider.
    ///
    /// Fails if the name is not a valid tag name, if the provider's file id
    /// (for this registry's station) is not in the file table, or if the name
    /// is already taken. A rejected
    /// provider is logged and dropped; the registry is unchanged.
    pub fn register(&mut self, provider: Box<dyn StoreData>) -> RegistryResult<()> {
        let name = provider.name().to_string();
        let file_id = provider.store_file_id(self.sta_id);

        if !xml::is_valid_name(&name) {
            error!(store_data = %name, "invalid store data name");
            return Err(RegistryError::InvalidName(name));
        }
        if !self.table.contains(file_id) {
            error!(store_data = %name, file = %file_id, "invalid store file specified");
            return Err(RegistryError::UnknownStoreFile { name, file_id });
        }
        if self.entries.iter().any(|r| r.name == name) {
            error!(store_data = %name, "duplicate store data name");
            return Err(RegistryError::DuplicateStoreData(name));
        }

        debug!(store_data = %name, file = %file_id, "registered store data");
        self.entries.push(Registration {
            name,
            file_id,
            provider,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every registration, in registration order.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter()
    }

    /// Registrations routed to `file_id`, in registration order.
    pub fn providers_for(&self, file_id: StoreFileId) -> impl Iterator<Item = &Registration> {
        self.entries.iter().filter(move |r| r.file_id == file_id)
    }

    /// Returns `true` if any provider of `file_id` has unserialized data.
    pub fn has_new_data(&self, file_id: StoreFileId) -> bool {
        self.providers_for(file_id).any(Registration::has_new_data)
    }

    /// Reset every provider of `file_id`.
    pub fn reset(&mut self, file_id: StoreFileId) {
        for reg in self.entries.iter_mut().filter(|r| r.file_id == file_id) {
            reg.provider.reset_data();
        }
    }
}

impl fmt::Debug for StoreDataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreDataRegistry")
            .field("sta_id", &self.sta_id)
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStoreData;

    fn registry() -> StoreDataRegistry {
        StoreDataRegistry::new(StaId::Primary, StoreFileTable::default())
    }

    #[test]
    fn register_and_route() {
        let mut reg = registry();
        reg.register(Box::new(InMemoryStoreData::new("A", StoreFileId::SharedGeneral)))
            .unwrap();
        reg.register(Box::new(InMemoryStoreData::new("B", StoreFileId::UserGeneral)))
            .unwrap();
        reg.register(Box::new(InMemoryStoreData::new("C", StoreFileId::SharedGeneral)))
            .unwrap();
        assert_eq!(reg.len(), 3);

        let shared: Vec<&str> = reg
            .providers_for(StoreFileId::SharedGeneral)
            .map(Registration::name)
            .collect();
        assert_eq!(shared, vec!["A", "C"]);
        assert_eq!(reg.providers_for(StoreFileId::UserNetworkSuggestions).count(), 0);
    }

    #[test]
    fn unknown_file_rejected() {
        let table = StoreFileTable::default().without(StoreFileId::SharedSecondary);
        let mut reg = StoreDataRegistry::new(StaId::Primary, table);
        let err = reg
            .register(Box::new(InMemoryStoreData::new("A", StoreFileId::SharedSecondary)))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownStoreFile { file_id: StoreFileId::SharedSecondary, .. }
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_name_rejected_across_files() {
        let mut reg = registry();
        reg.register(Box::new(InMemoryStoreData::new("A", StoreFileId::SharedGeneral)))
            .unwrap();
        let err = reg
            .register(Box::new(InMemoryStoreData::new("A", StoreFileId::UserGeneral)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateStoreData(ref n) if n == "A"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn invalid_name_rejected() {
        let mut reg = registry();
        for name in ["has space", "1st", "", "ns:tag"] {
            let err = reg
                .register(Box::new(InMemoryStoreData::new(name, StoreFileId::SharedGeneral)))
                .unwrap_err();
            assert!(matches!(err, RegistryError::InvalidName(ref n) if n == name));
        }
        assert!(reg.is_empty());
        reg.register(Box::new(InMemoryStoreData::new("Good", StoreFileId::SharedGeneral)))
            .unwrap();
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn has_new_data_per_file() {
        let mut reg = registry();
        let a = InMemoryStoreData::new("A", StoreFileId::SharedGeneral);
        let b = InMemoryStoreData::new("B", StoreFileId::UserGeneral);
        reg.register(Box::new(a.clone())).unwrap();
        reg.register(Box::new(b.clone())).unwrap();

        assert!(!reg.has_new_data(StoreFileId::SharedGeneral));
        a.set_data(b"X".to_vec());
        assert!(reg.has_new_data(StoreFileId::SharedGeneral));
        assert!(!reg.has_new_data(StoreFileId::UserGeneral));
    }

    #[test]
    fn reset_only_touches_target_file() {
        let mut reg = registry();
        let a = InMemoryStoreData::new("A", StoreFileId::SharedGeneral);
        let b = InMemoryStoreData::new("B", StoreFileId::UserGeneral);
        reg.register(Box::new(a.clone())).unwrap();
        reg.register(Box::new(b.clone())).unwrap();
        reg.reset(StoreFileId::SharedGeneral);
        assert_eq!(a.reset_count(), 1);
        assert_eq!(b.reset_count(), 0);
    }

    /// Provider relying on the default file selection.
    struct DefaultRouted;

    impl StoreData for DefaultRouted {
        fn name(&self) -> &str {
            "DefaultRouted"
        }
        fn serialize_data(
            &mut self,
            _cipher: Option<&dyn confstore_types::CredentialCipher>,
        ) -> crate::error::ProviderResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn deserialize_data(
            &mut self,
            _data: Option<&[u8]>,
            _version: Option<confstore_types::DataVersion>,
            _cipher: Option<&dyn confstore_types::CredentialCipher>,
        ) -> crate::error::ProviderResult<()> {
            Ok(())
        }
        fn reset_data(&mut self) {}
        fn has_new_data_to_serialize(&self) -> bool {
            false
        }
    }

    #[test]
    fn default_routing_follows_station() {
        let mut primary = registry();
        primary.register(Box::new(DefaultRouted)).unwrap();
        assert_eq!(primary.providers_for(StoreFileId::UserGeneral).count(), 1);

        let mut secondary = StoreDataRegistry::new(StaId::Secondary, StoreFileTable::default());
        secondary.register(Box::new(DefaultRouted)).unwrap();
        assert_eq!(secondary.providers_for(StoreFileId::UserSecondary).count(), 1);
    }
}
