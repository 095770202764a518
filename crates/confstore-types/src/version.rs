use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Envelope format version.
///
/// Versions are strictly increasing integers starting at 1. Only values in
/// `[DataVersion::INITIAL, DataVersion::CURRENT]` can be constructed, so a
/// `DataVersion` in hand is always one this build understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct DataVersion(u32);

impl DataVersion {
    /// First released format.
    pub const INITIAL: DataVersion = DataVersion(1);
    /// Format carrying a header integrity block, now obsolete. Readers skip
    /// the block without interpreting it.
    pub const INTEGRITY: DataVersion = DataVersion(2);
    /// Format in which providers may encrypt credentials.
    pub const ENCRYPT_CREDENTIALS: DataVersion = DataVersion(3);
    /// Version written by this build.
    pub const CURRENT: DataVersion = DataVersion::ENCRYPT_CREDENTIALS;

    /// Validate a raw version number read from disk.
    pub fn new(raw: i64) -> Result<Self, TypeError> {
        if raw < i64::from(Self::INITIAL.0) || raw > i64::from(Self::CURRENT.0) {
            return Err(TypeError::InvalidVersion {
                version: raw,
                min: Self::INITIAL.0,
                max: Self::CURRENT.0,
            });
        }
        Ok(Self(raw as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Returns `true` for the obsolete integrity format.
    pub fn has_integrity_block(&self) -> bool {
        *self == Self::INTEGRITY
    }
}

impl TryFrom<i64> for DataVersion {
    type Error = TypeError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<DataVersion> for u32 {
    fn from(v: DataVersion) -> u32 {
        v.0
    }
}

impl fmt::Display for DataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
