use confstore_file::StoreFile;
use confstore_registry::StoreData;
use confstore_store::{AlarmHandle, ConfigStore, StoreConfig, StoreResult};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{ServiceError, ServiceResult};
use crate::timer::TokioAlarmScheduler;

/// Requests processed by the service task, one at a time.
pub(crate) enum Command {
    Register {
        provider: Box<dyn StoreData>,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    SetUserStores {
        stores: Vec<StoreFile>,
        reply: oneshot::Sender<()>,
    },
    SwitchUserStores {
        stores: Vec<StoreFile>,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    Write {
        force_sync: bool,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    Read {
        reply: oneshot::Sender<StoreResult<()>>,
    },
    StoresPresent {
        reply: oneshot::Sender<bool>,
    },
    VerboseLogging(bool),
    Dump {
        reply: oneshot::Sender<String>,
    },
    AlarmFired(AlarmHandle),
    Shutdown {
        reply: oneshot::Sender<StoreResult<()>>,
    },
}

/// Spawns the task that owns a [`ConfigStore`].
pub struct StoreService;

impl StoreService {
    /// Build a store over `shared_store` and run it on a new task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(config: StoreConfig, shared_store: StoreFile) -> (StoreHandle, JoinHandle<()>) {
        Self::spawn_with(config, shared_store, |store| store)
    }

    /// Like [`spawn`](Self::spawn), with `customize` applied to the store
    /// before the task starts (clock, metrics, providers).
    pub fn spawn_with<F>(
        config: StoreConfig,
        shared_store: StoreFile,
        customize: F,
    ) -> (StoreHandle, JoinHandle<()>)
    where
        F: FnOnce(ConfigStore) -> ConfigStore,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let alarms = TokioAlarmScheduler::new(tx.downgrade());
        let store = customize(ConfigStore::new(config, shared_store, alarms));
        let task = tokio::spawn(run(store, rx));
        (StoreHandle { tx }, task)
    }
}

async fn run(mut store: ConfigStore, mut rx: mpsc::UnboundedReceiver<Command>) {
    info!(sta = %store.sta_id(), "store service started");
    while let Some(command) = rx.recv().await {
        match command {
            Command::Register { provider, reply } => {
                let _ = reply.send(store.register_store_data(provider));
            }
            Command::SetUserStores { stores, reply } => {
                store.set_user_stores(stores);
                let _ = reply.send(());
            }
            Command::SwitchUserStores { stores, reply } => {
                let _ = reply.send(store.switch_user_stores_and_read(stores));
            }
            Command::Write { force_sync, reply } => {
                let _ = reply.send(store.write(force_sync));
            }
            Command::Read { reply } => {
                let _ = reply.send(store.read());
            }
            Command::StoresPresent { reply } => {
                let _ = reply.send(store.are_stores_present());
            }
            Command::VerboseLogging(verbose) => store.enable_verbose_logging(verbose),
            Command::Dump { reply } => {
                let mut out = String::new();
                let _ = store.dump(&mut out);
                let _ = reply.send(out);
            }
            Command::AlarmFired(handle) => {
                if let Err(e) = store.on_alarm(handle) {
                    error!(error = %e, "buffered write failed");
                }
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(store.write(true));
                info!("store service stopped");
                return;
            }
        }
    }

    // Every handle is gone: flush whatever is still buffered.
    debug!("all store handles dropped");
    if let Err(e) = store.write(true) {
        error!(error = %e, "final flush failed");
    }
    info!("store service stopped");
}

/// Cloneable async front end of a running store.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl StoreHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> ServiceResult<T> {
        let (reply, response) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| ServiceError::Closed)?;
        response.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn register_store_data(&self, provider: Box<dyn StoreData>) -> ServiceResult<()> {
        Ok(self
            .request(|reply| Command::Register { provider, reply })
            .await??)
    }

    pub async fn set_user_stores(&self, stores: Vec<StoreFile>) -> ServiceResult<()> {
        self.request(|reply| Command::SetUserStores { stores, reply })
            .await
    }

    pub async fn switch_user_stores(&self, stores: Vec<StoreFile>) -> ServiceResult<()> {
        Ok(self
            .request(|reply| Command::SwitchUserStores { stores, reply })
            .await??)
    }

    pub async fn write(&self, force_sync: bool) -> ServiceResult<()> {
        Ok(self
            .request(|reply| Command::Write { force_sync, reply })
            .await??)
    }

    pub async fn read(&self) -> ServiceResult<()> {
        Ok(self.request(|reply| Command::Read { reply }).await??)
    }

    pub async fn are_stores_present(&self) -> ServiceResult<bool> {
        self.request(|reply| Command::StoresPresent { reply }).await
    }

    pub fn enable_verbose_logging(&self, verbose: bool) -> ServiceResult<()> {
        self.tx
            .send(Command::VerboseLogging(verbose))
            .map_err(|_| ServiceError::Closed)
    }

    pub async fn dump(&self) -> ServiceResult<String> {
        self.request(|reply| Command::Dump { reply }).await
    }

    /// Commit everything buffered, then stop the service.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        Ok(self.request(|reply| Command::Shutdown { reply }).await??)
    }
}
