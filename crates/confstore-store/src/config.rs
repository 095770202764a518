use std::fs;
use std::path::Path;
use std::time::Duration;

use confstore_file::FailedWritePolicy;
use confstore_types::{StaId, StoreFileTable};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration of one store instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Delay between the first buffered write and its commit.
    #[serde(rename = "buffered_write_interval_ms", with = "millis")]
    pub buffered_write_interval: Duration,
    /// Name of the directory created under each base directory.
    pub store_directory_name: String,
    /// Whether providers get a per-file cipher for credentials.
    pub encrypt_credentials: bool,
    /// Station this instance serves.
    pub sta_id: StaId,
    /// What to do with a pending buffer when its commit fails.
    pub failed_write_policy: FailedWritePolicy,
    /// File id to file name table.
    pub file_table: StoreFileTable,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            buffered_write_interval: Duration::from_secs(10),
            store_directory_name: "confstore".to_string(),
            encrypt_credentials: false,
            sta_id: StaId::Primary,
            failed_write_policy: FailedWritePolicy::Discard,
            file_table: StoreFileTable::default(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(d.as_millis()).map_err(serde::ser::Error::custom)?;
        s.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confstore_types::StoreFileId;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.buffered_write_interval, Duration::from_secs(10));
        assert_eq!(c.store_directory_name, "confstore");
        assert!(!c.encrypt_credentials);
        assert_eq!(c.sta_id, StaId::Primary);
        assert_eq!(c.failed_write_policy, FailedWritePolicy::Discard);
        assert_eq!(c.file_table, StoreFileTable::default());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let c = StoreConfig::from_toml_str(
            r#"
            buffered_write_interval_ms = 250
            sta_id = "secondary"
            failed_write_policy = "retain"
            "#,
        )
        .unwrap();
        assert_eq!(c.buffered_write_interval, Duration::from_millis(250));
        assert_eq!(c.sta_id, StaId::Secondary);
        assert_eq!(c.failed_write_policy, FailedWritePolicy::Retain);
        assert_eq!(c.store_directory_name, "confstore");
    }

    #[test]
    fn custom_file_table() {
        let c = StoreConfig::from_toml_str(
            r#"
            [file_table]
            shared-general = "shared.xml"
            user-general = "user.xml"
            "#,
        )
        .unwrap();
        assert_eq!(c.file_table.len(), 2);
        assert_eq!(c.file_table.file_name(StoreFileId::UserGeneral), Some("user.xml"));
        assert!(!c.file_table.contains(StoreFileId::SharedSecondary));
    }

    #[test]
    fn unknown_sta_is_rejected() {
        let err = StoreConfig::from_toml_str("sta_id = \"tertiary\"").unwrap_err();
        assert!(matches!(err, StoreError::ConfigParse(_)));
    }

    #[test]
    fn toml_round_trip() {
        let c = StoreConfig {
            buffered_write_interval: Duration::from_millis(1500),
            encrypt_credentials: true,
            ..Default::default()
        };
        let text = c.to_toml_string().unwrap();
        assert!(text.contains("buffered_write_interval_ms = 1500"));
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        fs::write(&path, "store_directory_name = \"wifi\"\n").unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap().store_directory_name, "wifi");

        let err = StoreConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StoreError::ConfigRead { .. }));
    }
}
