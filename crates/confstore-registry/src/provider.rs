//! The [`StoreData`] trait implemented by every data provider.

use confstore_types::{CredentialCipher, DataVersion, StaId, StoreFileId};

use crate::error::ProviderResult;

/// A subsystem that owns one named section of persisted data.
///
/// The store only ever calls through this trait; it never looks inside the
/// bytes a provider produces. Implementations must satisfy:
///
/// - `name()` is stable and unique among all providers of a store, and is a
///   valid tag name.
/// - `serialize_data` returns a well-formed markup fragment (build it with
///   [`XmlWriter`](confstore_envelope::XmlWriter)); any bytes it returns are
///   what `deserialize_data` later receives, unchanged.
/// - `deserialize_data` is called exactly once per store read, with `None`
///   when the file has no section for this provider.
pub trait StoreData: Send {
    /// Section name.
    fn name(&self) -> &str;

    /// File this provider's section is written to, for the given station.
    fn store_file_id(&self, sta: StaId) -> StoreFileId {
        sta.default_user_file()
    }

    /// Produce the section payload.
    fn serialize_data(&mut self, cipher: Option<&dyn CredentialCipher>) -> ProviderResult<Vec<u8>>;

    /// Consume the section payload.
    ///
    /// `data` is `None` when there is nothing stored for this provider.
    /// `version` is `None` when the file itself is absent, otherwise the
    /// version of the document that was read.
    fn deserialize_data(
        &mut self,
        data: Option<&[u8]>,
        version: Option<DataVersion>,
        cipher: Option<&dyn CredentialCipher>,
    ) -> ProviderResult<()>;

    /// Drop all in-memory state, before a read.
    fn reset_data(&mut self);

    /// Returns `true` if there is data that has not been serialized yet.
    fn has_new_data_to_serialize(&self) -> bool;
}
