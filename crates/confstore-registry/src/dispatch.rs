//! Per-file serialize/deserialize over the registered providers.

use std::collections::BTreeSet;

use confstore_envelope::{Envelope, EnvelopeCodec, EnvelopeError, EnvelopeParser, Section, SectionRef};
use confstore_types::{CredentialCipher, DataVersion, StoreFileId};
use tracing::{debug, error};

use crate::error::{RegistryError, RegistryResult};
use crate::registry::StoreDataRegistry;

impl StoreDataRegistry {
    /// Build the document for `file_id`: one section per provider of that
    /// file, in registration order, at the current version.
    pub fn serialize(
        &mut self,
        file_id: StoreFileId,
        cipher: Option<&dyn CredentialCipher>,
    ) -> RegistryResult<Vec<u8>> {
        let verbose = self.verbose;
        let mut envelope = Envelope::new();
        for reg in self.entries.iter_mut().filter(|r| r.file_id == file_id) {
            let payload = reg
                .provider
                .serialize_data(cipher)
                .map_err(|source| RegistryError::Provider {
                    name: reg.name.clone(),
                    source,
                })?;
            if verbose {
                debug!(store_data = %reg.name, file = %file_id, bytes = payload.len(), "serialized");
            }
            envelope.sections.push(Section::new(reg.name.clone(), payload));
        }
        EnvelopeCodec::encode(&envelope)
            .map_err(|source| RegistryError::Envelope { file_id, source })
    }

    /// Feed the content of `file_id` to its providers.
    ///
    /// `None` means the file does not exist: every provider is told there is
    /// no data and no version. Otherwise the whole document is validated
    /// first, then each section goes to its owner in file order and the
    /// remaining providers are told there is no data for the parsed version.
    /// Each provider of the file gets exactly one call.
    pub fn deserialize(
        &mut self,
        data: Option<&[u8]>,
        file_id: StoreFileId,
        cipher: Option<&dyn CredentialCipher>,
    ) -> RegistryResult<()> {
        let Some(bytes) = data else {
            debug!(file = %file_id, "no store file, notifying providers of empty data");
            return self.deliver(file_id, None, &BTreeSet::new(), &[], cipher);
        };

        let (version, sections) = self.parse(bytes, file_id)?;
        let owners: BTreeSet<&str> = sections.iter().map(|s| s.name).collect();
        self.deliver(file_id, Some(version), &owners, &sections, cipher)
    }

    /// Parse the document and check every section against the providers of
    /// `file_id`. No provider is touched.
    fn parse<'a>(
        &self,
        bytes: &'a [u8],
        file_id: StoreFileId,
    ) -> RegistryResult<(DataVersion, Vec<SectionRef<'a>>)> {
        let envelope_err = |source: EnvelopeError| RegistryError::Envelope { file_id, source };
        let mut parser = EnvelopeParser::new(bytes).map_err(envelope_err)?;
        let version = parser.read_header().map_err(envelope_err)?;

        let mut sections: Vec<SectionRef<'a>> = Vec::new();
        while let Some(section) = parser.next_section().map_err(envelope_err)? {
            if !self.providers_for(file_id).any(|r| r.name == section.name) {
                let known = self.providers_for(file_id).map(|r| r.name.clone()).collect();
                error!(file = %file_id, section = section.name, "unknown store data");
                return Err(RegistryError::UnknownSection {
                    file_id,
                    section: section.name.to_string(),
                    known,
                });
            }
            if sections.iter().any(|s| s.name == section.name) {
                error!(file = %file_id, section = section.name, "duplicate store data");
                return Err(RegistryError::DuplicateSection {
                    file_id,
                    section: section.name.to_string(),
                });
            }
            sections.push(section);
        }
        debug!(file = %file_id, version = version.get(), sections = sections.len(), "parsed store file");
        Ok((version, sections))
    }

    fn deliver(
        &mut self,
        file_id: StoreFileId,
        version: Option<DataVersion>,
        owners: &BTreeSet<&str>,
        sections: &[SectionRef<'_>],
        cipher: Option<&dyn CredentialCipher>,
    ) -> RegistryResult<()> {
        let verbose = self.verbose;

        // Sections first, in file order, then everyone without one.
        let mut order: Vec<(usize, Option<&[u8]>)> = Vec::with_capacity(self.entries.len());
        for section in sections {
            if let Some(idx) = self
                .entries
                .iter()
                .position(|r| r.file_id == file_id && r.name == section.name)
            {
                order.push((idx, Some(section.content)));
            }
        }
        for (idx, reg) in self.entries.iter().enumerate() {
            if reg.file_id == file_id && !owners.contains(reg.name.as_str()) {
                order.push((idx, None));
            }
        }

        for (idx, content) in order {
            let reg = &mut self.entries[idx];
            if verbose {
                debug!(
                    store_data = %reg.name,
                    file = %file_id,
                    bytes = ?content.map(<[u8]>::len),
                    "delivering"
                );
            }
            if let Err(source) = reg.provider.deserialize_data(content, version, cipher) {
                let name = reg.name.clone();
                error!(store_data = %name, file = %file_id, error = %source, "store data rejected its content");
                self.reset(file_id);
                return Err(RegistryError::Provider { name, source });
            }
        }
        Ok(())
    }
}
