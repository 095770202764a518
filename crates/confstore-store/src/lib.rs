//! Buffered configuration store.
//!
//! [`ConfigStore`] ties the provider registry to the shared and per-user
//! store files and decides when buffered data is committed:
//!
//! - `write(false)` buffers new data and arms one debounce alarm
//! - `write(true)` commits now, cancelling the alarm
//! - the alarm fire commits every pending buffer
//!
//! # Modules
//!
//! - [`store`] -- [`ConfigStore`]
//! - [`config`] -- [`StoreConfig`], loadable from TOML
//! - [`files`] -- Store file construction per station
//! - [`alarm`] -- [`AlarmScheduler`] and the manual test scheduler
//! - [`clock`] -- [`Clock`] implementations
//! - [`metrics`] -- [`StoreMetrics`] sinks
//! - [`error`] -- [`StoreError`]

pub mod alarm;
pub mod clock;
pub mod config;
pub mod error;
pub mod files;
pub mod metrics;
pub mod store;

pub use alarm::{AlarmHandle, AlarmScheduler, ManualAlarmScheduler, ScheduledAlarm, WRITE_BUFFER_ALARM_TAG};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use files::{create_shared_file, create_user_files};
pub use metrics::{NoopMetrics, RecordingMetrics, StoreMetrics};
pub use store::ConfigStore;
