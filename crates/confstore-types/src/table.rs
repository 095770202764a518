use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::file_id::StoreFileId;

/// Immutable mapping from [`StoreFileId`] to on-disk file name.
///
/// Passed into a store at construction. A deployment that does not use some
/// files (for example the secondary station variants) supplies a table
/// without them, and providers targeting a missing id are rejected at
/// registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreFileTable {
    names: BTreeMap<StoreFileId, String>,
}

impl StoreFileTable {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self { names: BTreeMap::new() }
    }

    /// Add or replace an entry, returning the updated table.
    pub fn with_entry(mut self, id: StoreFileId, file_name: impl Into<String>) -> Self {
        self.names.insert(id, file_name.into());
        self
    }

    /// Remove an entry, returning the updated table.
    pub fn without(mut self, id: StoreFileId) -> Self {
        self.names.remove(&id);
        self
    }

    pub fn file_name(&self, id: StoreFileId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn contains(&self, id: StoreFileId) -> bool {
        self.names.contains_key(&id)
    }

    /// Entries in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (StoreFileId, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for StoreFileTable {
    fn default() -> Self {
        Self::empty()
            .with_entry(StoreFileId::SharedGeneral, "ConfigStore.xml")
            .with_entry(StoreFileId::UserGeneral, "ConfigStore.xml")
            .with_entry(StoreFileId::UserNetworkSuggestions, "ConfigStoreNetworkSuggestions.xml")
            .with_entry(StoreFileId::SharedSecondary, "ConfigStoreSecondary.xml")
            .with_entry(StoreFileId::UserSecondary, "ConfigStoreSecondary.xml")
    }
}
