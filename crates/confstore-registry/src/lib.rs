//! Provider registry and per-file dispatch for confstore.
//!
//! Providers implement [`StoreData`] and own one named section each. The
//! [`StoreDataRegistry`] routes them to store files and turns their sections
//! into file content and back.
//!
//! # Modules
//!
//! - [`provider`] -- The [`StoreData`] trait
//! - [`registry`] -- Registration, routing, reset
//! - [`dispatch`] -- `serialize` / `deserialize` for one file
//! - [`memory`] -- [`InMemoryStoreData`] for tests and embedding
//! - [`error`] -- [`RegistryError`], [`ProviderError`]

pub mod dispatch;
pub mod error;
pub mod memory;
pub mod provider;
pub mod registry;

pub use error::{ProviderError, ProviderResult, RegistryError, RegistryResult};
pub use memory::{Delivery, InMemoryStoreData};
pub use provider::StoreData;
pub use registry::{Registration, StoreDataRegistry};
