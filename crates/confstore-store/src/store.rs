use std::fmt;

use confstore_file::StoreFile;
use confstore_registry::{StoreData, StoreDataRegistry};
use confstore_types::StaId;
use tracing::{debug, error, warn};

use crate::alarm::{AlarmHandle, AlarmScheduler, WRITE_BUFFER_ALARM_TAG};
use crate::clock::{Clock, MonotonicClock};
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::metrics::{duration_ms, NoopMetrics, StoreMetrics};

/// The configuration store.
///
/// Owns the shared store file, the optional per-user store files and the
/// provider registry. Writes are buffered per file and committed either
/// immediately (forced) or when the debounce alarm fires.
///
/// All methods take `&mut self`: the store is a single-writer state machine.
/// The host must deliver alarm fires through [`on_alarm`](Self::on_alarm)
/// on the same context as every other call.
pub struct ConfigStore {
    config: StoreConfig,
    registry: StoreDataRegistry,
    shared_store: StoreFile,
    user_stores: Option<Vec<StoreFile>>,
    alarms: Box<dyn AlarmScheduler>,
    clock: Box<dyn Clock>,
    metrics: Box<dyn StoreMetrics>,
    pending_alarm: Option<AlarmHandle>,
    verbose: bool,
}

impl ConfigStore {
    pub fn new(
        config: StoreConfig,
        shared_store: StoreFile,
        alarms: impl AlarmScheduler + 'static,
    ) -> Self {
        if shared_store.file_id() != config.sta_id.shared_file() {
            warn!(
                file = %shared_store.file_id(),
                sta = %config.sta_id,
                "shared store does not match the station's shared file"
            );
        }
        let registry = StoreDataRegistry::new(config.sta_id, config.file_table.clone());
        Self {
            config,
            registry,
            shared_store,
            user_stores: None,
            alarms: Box::new(alarms),
            clock: Box::new(MonotonicClock::new()),
            metrics: Box::new(NoopMetrics),
            pending_alarm: None,
            verbose: false,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_metrics(mut self, metrics: impl StoreMetrics + 'static) -> Self {
        self.metrics = Box::new(metrics);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn sta_id(&self) -> StaId {
        self.config.sta_id
    }

    pub fn registry(&self) -> &StoreDataRegistry {
        &self.registry
    }

    pub fn enable_verbose_logging(&mut self, verbose: bool) {
        self.verbose = verbose;
        self.registry.set_verbose(verbose);
    }

    /// Register a provider. A rejected provider is logged and dropped.
    pub fn register_store_data(&mut self, provider: Box<dyn StoreData>) -> StoreResult<()> {
        Ok(self.registry.register(provider)?)
    }

    /// Install the per-user store files. They are not read; call
    /// [`read`](Self::read) afterwards.
    pub fn set_user_stores(&mut self, stores: Vec<StoreFile>) {
        for store in &stores {
            if !self.config.sta_id.user_files().contains(&store.file_id()) {
                warn!(file = %store.file_id(), sta = %self.config.sta_id, "unexpected user store file");
            }
        }
        self.user_stores = Some(stores);
    }

    /// Whether the shared store file exists on disk.
    pub fn are_stores_present(&self) -> bool {
        self.shared_store.exists()
    }

    /// Whether the debounce alarm is armed.
    pub fn has_pending_buffered_write(&self) -> bool {
        self.pending_alarm.is_some()
    }

    /// Serialize every file that has providers with new data and buffer it.
    ///
    /// With `force_sync` the buffers are committed now. Otherwise the
    /// debounce alarm is armed if it is not already. A forced call without
    /// new data still commits when the alarm is armed or any file holds a
    /// buffer from an earlier call.
    pub fn write(&mut self, force_sync: bool) -> StoreResult<()> {
        let mut has_new_data = buffer_new_data(&mut self.registry, &mut self.shared_store)?;
        if let Some(users) = self.user_stores.as_mut() {
            for store in users.iter_mut() {
                has_new_data |= buffer_new_data(&mut self.registry, store)?;
            }
        }

        if has_new_data {
            if force_sync {
                self.commit()
            } else {
                self.start_buffered_write_alarm();
                Ok(())
            }
        } else if force_sync && (self.pending_alarm.is_some() || self.has_buffered_data()) {
            self.commit()
        } else {
            Ok(())
        }
    }

    /// Deliver an alarm fire. Fires of anything but the armed alarm are
    /// ignored.
    pub fn on_alarm(&mut self, handle: AlarmHandle) -> StoreResult<()> {
        if self.pending_alarm != Some(handle) {
            debug!(alarm = handle.id(), "ignoring stale alarm");
            return Ok(());
        }
        // The alarm is spent; it must not be cancelled.
        self.pending_alarm = None;
        self.commit()
    }

    fn has_buffered_data(&self) -> bool {
        self.shared_store.has_pending_write()
            || self.user_stores.iter().flatten().any(StoreFile::has_pending_write)
    }

    fn start_buffered_write_alarm(&mut self) {
        if self.pending_alarm.is_some() {
            return;
        }
        let handle = self
            .alarms
            .schedule(WRITE_BUFFER_ALARM_TAG, self.config.buffered_write_interval);
        if self.verbose {
            debug!(alarm = handle.id(), delay = ?self.config.buffered_write_interval, "buffered write armed");
        }
        self.pending_alarm = Some(handle);
    }

    fn stop_buffered_write_alarm(&mut self) {
        if let Some(handle) = self.pending_alarm.take() {
            self.alarms.cancel(handle);
        }
    }

    /// Commit every pending buffer. Each file is attempted; the first
    /// failure is returned.
    fn commit(&mut self) -> StoreResult<()> {
        self.stop_buffered_write_alarm();
        let policy = self.config.failed_write_policy;
        let start = self.clock.now();

        let mut first_error = None;
        let users = self.user_stores.iter_mut().flatten();
        for store in std::iter::once(&mut self.shared_store).chain(users) {
            if let Err(e) = store.write_buffered_raw_data(policy) {
                error!(file = %store.file_id(), error = %e, "failed to commit store file");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        let elapsed = self.clock.now().saturating_sub(start);
        if self.verbose {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "writing to stores completed");
        }
        if let Some(ms) = duration_ms(elapsed) {
            self.metrics.note_write_duration(ms);
        }
        Ok(())
    }

    /// Reset every provider, then read the shared file followed by each
    /// user file.
    pub fn read(&mut self) -> StoreResult<()> {
        self.registry.reset(self.shared_store.file_id());
        if let Some(users) = &self.user_stores {
            for store in users {
                self.registry.reset(store.file_id());
            }
        }

        let start = self.clock.now();
        read_store(&mut self.registry, &self.shared_store)?;
        if let Some(users) = &self.user_stores {
            for store in users {
                read_store(&mut self.registry, store)?;
            }
        }
        let elapsed = self.clock.now().saturating_sub(start);
        if self.verbose {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "reading from all stores completed");
        }
        if let Some(ms) = duration_ms(elapsed) {
            self.metrics.note_read_duration(ms);
        }
        Ok(())
    }

    /// Replace the user files on a user switch and read the new ones.
    ///
    /// Pending buffered data is committed first so it lands in the outgoing
    /// user's files.
    pub fn switch_user_stores_and_read(&mut self, stores: Vec<StoreFile>) -> StoreResult<()> {
        if self.pending_alarm.is_some() {
            self.commit()?;
        }
        if let Some(old) = &self.user_stores {
            for store in old {
                self.registry.reset(store.file_id());
            }
        }
        self.stop_buffered_write_alarm();
        self.set_user_stores(stores);

        let start = self.clock.now();
        if let Some(users) = &self.user_stores {
            for store in users {
                self.registry.reset(store.file_id());
                read_store(&mut self.registry, store)?;
            }
        }
        let elapsed = self.clock.now().saturating_sub(start);
        if self.verbose {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "reading from user stores completed");
        }
        if let Some(ms) = duration_ms(elapsed) {
            self.metrics.note_read_duration(ms);
        }
        Ok(())
    }

    /// Human-readable state of the store.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "Dump of ConfigStore")?;
        writeln!(out, "Station: {}", self.config.sta_id)?;
        writeln!(out, "Verbose logging: {}", self.verbose)?;
        writeln!(out, "Buffered write pending: {}", self.pending_alarm.is_some())?;
        writeln!(out, "Store files:")?;
        let users = self.user_stores.iter().flatten();
        for store in std::iter::once(&self.shared_store).chain(users) {
            writeln!(
                out,
                "  {}: {} (credentials encrypted: {})",
                store.file_id(),
                store.path().display(),
                store.cipher().is_some()
            )?;
        }
        writeln!(out, "Store data:")?;
        for reg in self.registry.registrations() {
            let file_name = self.config.file_table.file_name(reg.file_id()).unwrap_or("?");
            writeln!(out, "  {} -> {} ({})", reg.name(), reg.file_id(), file_name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("sta_id", &self.config.sta_id)
            .field("shared_store", &self.shared_store)
            .field("user_stores", &self.user_stores)
            .field("registry", &self.registry)
            .field("pending_alarm", &self.pending_alarm)
            .finish()
    }
}

fn buffer_new_data(registry: &mut StoreDataRegistry, store: &mut StoreFile) -> StoreResult<bool> {
    if !registry.has_new_data(store.file_id()) {
        return Ok(false);
    }
    let data = registry.serialize(store.file_id(), store.cipher())?;
    store.store_raw_data_to_write(data);
    Ok(true)
}

fn read_store(registry: &mut StoreDataRegistry, store: &StoreFile) -> StoreResult<()> {
    let data = store.read_raw_data()?;
    registry.deserialize(data.as_deref(), store.file_id(), store.cipher())?;
    Ok(())
}
