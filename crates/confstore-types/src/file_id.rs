use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of one physical store file.
///
/// The set is closed: every backing file a store can write is named here.
/// The mapping from identifier to on-disk file name lives in
/// [`StoreFileTable`](crate::StoreFileTable), not on the enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreFileId {
    /// Device-wide data, readable before any user session exists.
    SharedGeneral,
    /// Per-user general data.
    UserGeneral,
    /// Per-user suggestions data.
    UserNetworkSuggestions,
    /// Device-wide data of the secondary station.
    SharedSecondary,
    /// Per-user data of the secondary station.
    UserSecondary,
}

impl StoreFileId {
    /// Every identifier, in declaration order.
    pub const ALL: [StoreFileId; 5] = [
        StoreFileId::SharedGeneral,
        StoreFileId::UserGeneral,
        StoreFileId::UserNetworkSuggestions,
        StoreFileId::SharedSecondary,
        StoreFileId::UserSecondary,
    ];

    /// Stable kebab-case name, as used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreFileId::SharedGeneral => "shared-general",
            StoreFileId::UserGeneral => "user-general",
            StoreFileId::UserNetworkSuggestions => "user-network-suggestions",
            StoreFileId::SharedSecondary => "shared-secondary",
            StoreFileId::UserSecondary => "user-secondary",
        }
    }

    /// Returns `true` for files that live outside any user session.
    pub fn is_shared(&self) -> bool {
        matches!(self, StoreFileId::SharedGeneral | StoreFileId::SharedSecondary)
    }
}

impl fmt::Display for StoreFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreFileId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StoreFileId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| TypeError::UnknownFileId(s.to_string()))
    }
}

/// Station selector: which instance of the store a process is running.
///
/// The primary station writes the general files; the secondary station has
/// its own shared and user files so the two never share a section namespace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaId {
    #[default]
    Primary,
    Secondary,
}

impl StaId {
    /// The shared file written by this station.
    pub fn shared_file(&self) -> StoreFileId {
        match self {
            StaId::Primary => StoreFileId::SharedGeneral,
            StaId::Secondary => StoreFileId::SharedSecondary,
        }
    }

    /// The per-user files written by this station, in read order.
    pub fn user_files(&self) -> &'static [StoreFileId] {
        match self {
            StaId::Primary => &[StoreFileId::UserGeneral, StoreFileId::UserNetworkSuggestions],
            StaId::Secondary => &[StoreFileId::UserSecondary],
        }
    }

    /// Default destination of a provider that does not choose one itself.
    pub fn default_user_file(&self) -> StoreFileId {
        match self {
            StaId::Primary => StoreFileId::UserGeneral,
            StaId::Secondary => StoreFileId::UserSecondary,
        }
    }
}

impl fmt::Display for StaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaId::Primary => f.write_str("primary"),
            StaId::Secondary => f.write_str("secondary"),
        }
    }
}

impl FromStr for StaId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(StaId::Primary),
            "secondary" => Ok(StaId::Secondary),
            other => Err(TypeError::UnknownStaId(other.to_string())),
        }
    }
}
