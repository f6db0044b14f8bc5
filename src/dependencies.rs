// src/dependencies.rs - Builds and owns the alert pipeline components

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::bus::EventBus;
use crate::config::Config;
use crate::error::Result;
use crate::hub::Hub;
use crate::notifier::EmailDispatcher;
use crate::observe::ClusterObserver;
use crate::pool::WorkerPool;
use crate::rules::Thresholds;
use crate::state::AlertStateManager;
use crate::storage::{create_repository, AlertRepository};
use crate::watch::{MetricsWatcher, NodeWatcher, PodWatcher};

const EVALUATOR_WORKERS: usize = 5;
const EVALUATOR_QUEUE_SIZE: usize = 300;
const POOL_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// The wired pipeline. Components are plain owned objects; tests construct
/// as many independent instances as they like.
pub struct Dependencies {
    pub config: Arc<Config>,
    pub repository: Arc<dyn AlertRepository>,
    pub bus: Arc<EventBus>,
    pub hub: Arc<Hub>,
    pub pool: Arc<WorkerPool>,
    pub state_manager: Arc<AlertStateManager>,
    pub pod_watcher: PodWatcher,
    pub node_watcher: NodeWatcher,
    pub metrics_watcher: MetricsWatcher,
}

impl Dependencies {
    /// Compose the pipeline bottom-up: repository, sinks, bus, state
    /// manager, pool, watchers.
    pub async fn build(config: Config, observer: Arc<dyn ClusterObserver>) -> Result<Self> {
        let config = Arc::new(config);
        let repository = create_repository(&config).await?;

        let hub = Arc::new(Hub::new());

        let mut bus = EventBus::new();
        bus.subscribe(hub.clone());

        if config.email_ready() {
            match EmailDispatcher::new(config.email.clone()) {
                Ok(dispatcher) => bus.subscribe(Arc::new(dispatcher)),
                Err(err) => warn!(error = %err, "Email dispatcher disabled"),
            }
        } else if config.email.enabled {
            warn!("Email enabled but SMTP host or credentials missing, dispatcher disabled");
        }

        let bus = Arc::new(bus);
        let state_manager = Arc::new(AlertStateManager::new(repository.clone(), bus.clone()));
        let pool = Arc::new(WorkerPool::new(EVALUATOR_WORKERS, EVALUATOR_QUEUE_SIZE));

        let thresholds = Thresholds::from(&config.alert_rules);

        let pod_watcher = PodWatcher::new(
            observer.clone(),
            state_manager.clone(),
            pool.clone(),
            thresholds.clone(),
        );
        let node_watcher =
            NodeWatcher::new(observer.clone(), state_manager.clone(), pool.clone());
        let metrics_watcher = MetricsWatcher::new(
            observer,
            state_manager.clone(),
            pool.clone(),
            thresholds,
            config.metrics_interval(),
        );

        Ok(Self {
            config,
            repository,
            bus,
            hub,
            pool,
            state_manager,
            pod_watcher,
            node_watcher,
            metrics_watcher,
        })
    }

    /// Start every long-lived scope, leaves first.
    pub async fn start(&self) {
        self.pool.start().await;
        self.bus.start().await;
        self.hub.start().await;
        self.pod_watcher.start().await;
        self.node_watcher.start().await;
        self.metrics_watcher.start().await;
        info!("Alert pipeline started");
    }

    /// Stop in reverse order: ingestion first, fan-out last.
    pub async fn stop(&self) {
        self.metrics_watcher.stop().await;
        self.node_watcher.stop().await;
        self.pod_watcher.stop().await;

        if let Err(err) = self.pool.stop_with_timeout(POOL_STOP_TIMEOUT).await {
            warn!(error = %err, "Worker pool did not drain before deadline");
        }

        self.bus.stop().await;
        self.hub.stop().await;
        info!("Alert pipeline stopped");
    }
}
