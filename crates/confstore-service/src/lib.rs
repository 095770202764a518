//! Tokio host for a confstore [`ConfigStore`](confstore_store::ConfigStore).
//!
//! One task owns the store. Callers talk to it through a cloneable
//! [`StoreHandle`]; alarm fires arrive on the same channel, so every store
//! call runs on one context in arrival order.
//!
//! # Modules
//!
//! - [`service`] -- [`StoreService`], [`StoreHandle`]
//! - [`timer`] -- [`TokioAlarmScheduler`]
//! - [`error`] -- [`ServiceError`]

pub mod error;
pub mod service;
pub mod timer;

pub use error::{ServiceError, ServiceResult};
pub use service::{StoreHandle, StoreService};
pub use timer::TokioAlarmScheduler;
