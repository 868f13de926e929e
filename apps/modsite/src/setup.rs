//! Component wiring

use std::sync::Arc;
use std::time::Duration;

use modsite_config::Config;
use modsite_errors::Error;
use modsite_events::EventSender;
use modsite_fetch::{FetchInfoRegistry, Fetcher};
use modsite_net::{NetClient, NetConfig};
use modsite_proxy::{ProxyClient, SourceRouter};
use modsite_queue::{HttpDispatchBackend, InProcessBackend, QueueBackend, WorkQueue};
use modsite_state::{ModuleStore, SqliteStore};
use modsite_worker::Worker;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The pipeline components a command runs against.
pub struct Services {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub worker: Arc<Worker>,
    pub registry: Arc<FetchInfoRegistry>,
    tx: EventSender,
    sweeper: JoinHandle<()>,
}

impl Services {
    /// Open the store and build the fetcher and worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the proxy and fetch
    /// settings are invalid.
    pub async fn initialize(config: Config, tx: EventSender) -> Result<Self, Error> {
        let db_path = config.db_path();
        debug!(path = %db_path.display(), "opening state database");
        let store = Arc::new(SqliteStore::open(&db_path).await?);

        let proxy = ProxyClient::from_config(&config.proxy, config.fetch.max_module_zip_size)?;
        let source = Arc::new(SourceRouter::new(Arc::new(proxy)));
        let fetcher = Fetcher::from_config(source, &config)?.with_event_sender(tx.clone());
        let registry = Arc::clone(fetcher.registry());
        let linger = config.fetch.fetch_info_linger();
        let sweeper = FetchInfoRegistry::spawn_sweeper(
            &registry,
            linger,
            linger.max(Duration::from_secs(1)),
        );

        let store_dyn: Arc<dyn ModuleStore> = store.clone();
        let worker = Worker::from_config(Arc::new(fetcher), store_dyn, &config)
            .with_event_sender(tx.clone());

        Ok(Self {
            config,
            store,
            worker: Arc::new(worker),
            registry,
            tx,
            sweeper,
        })
    }

    /// A work queue over the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatch URL is invalid.
    pub fn work_queue(&self, workers: usize) -> Result<WorkQueue, Error> {
        let backend: Arc<dyn QueueBackend> = match &self.config.queue.dispatch_url {
            Some(url) => {
                info!(url = %url, "dispatching tasks over HTTP");
                let client = NetClient::new(NetConfig {
                    timeout: self.config.fetch.timeout(),
                    ..NetConfig::default()
                })?;
                Arc::new(HttpDispatchBackend::new(client, url)?)
            }
            None => Arc::new(InProcessBackend::new(self.worker.clone())),
        };
        let workers = modsite_config::calculate_workers(workers);
        debug!(workers, backend = backend.name(), "starting work queue");
        Ok(WorkQueue::new(backend, workers).with_event_sender(self.tx.clone()))
    }
}

impl Drop for Services {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}
