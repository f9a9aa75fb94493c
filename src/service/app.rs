//! Main application state and service coordination
//!
//! `AppState` owns every shared component and the background maintenance
//! tasks. Components are built once at startup and shared by reference;
//! nothing downstream knows which queue backend was selected.

use crate::account::{AccountStore, MemoryAccountStore};
use crate::config::{AppConfig, QueueBackendKind};
use crate::matching::MatchEngine;
use crate::metrics::MetricsCollector;
use crate::queue::{ExpiringQueueStore, MemoryQueueStore, QueueStore};
use crate::session::SessionRegistry;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{info, warn};

/// Interval between queue maintenance passes.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

pub struct AppState {
    config: AppConfig,
    instance_id: uuid::Uuid,
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn QueueStore>,
    pub engine: Arc<MatchEngine>,
    pub accounts: Arc<dyn AccountStore>,
    pub metrics: Arc<MetricsCollector>,
    shutdown_tx: broadcast::Sender<()>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let instance_id = crate::utils::generate_instance_id();
        info!("Initializing chat matchmaking service (instance {})", instance_id);
        info!(
            "Configuration: service={}, queue_backend={:?}",
            config.service.name, config.server.queue_backend
        );

        let store: Arc<dyn QueueStore> = match config.server.queue_backend {
            QueueBackendKind::Memory => Arc::new(MemoryQueueStore::new()),
            QueueBackendKind::Expiring => {
                Arc::new(ExpiringQueueStore::new(config.policy.queue_entry_expiry()))
            }
        };

        let registry = Arc::new(SessionRegistry::new(config.policy.queue_cooldown()));
        let engine = Arc::new(MatchEngine::new(Arc::clone(&store), Arc::clone(&registry)));
        let accounts: Arc<dyn AccountStore> =
            Arc::new(MemoryAccountStore::new(config.policy.clone()));
        let metrics = Arc::new(MetricsCollector::new()?);

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            instance_id,
            registry,
            store,
            engine,
            accounts,
            metrics,
            shutdown_tx,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn instance_id(&self) -> uuid::Uuid {
        self.instance_id
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Start the background maintenance tasks.
    pub async fn start(&self) -> Result<()> {
        {
            let mut running = self.is_running.write().await;
            *running = true;
        }

        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let maintenance = tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match store.prune_expired().await {
                            Ok(0) => {}
                            Ok(removed) => {
                                metrics.queue.expired_entries_total.inc_by(removed as u64);
                            }
                            Err(err) => warn!("Queue maintenance failed: {}", err),
                        }
                        match store.stats().await {
                            Ok(stats) => metrics.update_queue_depth(&stats),
                            Err(err) => warn!("Queue stats unavailable: {}", err),
                        }
                        if let Ok(count) = registry.connection_count() {
                            metrics.connections.active_connections.set(count as i64);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Queue maintenance task stopping");
                        break;
                    }
                }
            }
        });
        self.background_tasks.lock().await.push(maintenance);

        info!("Service components started");
        Ok(())
    }

    /// Signal every background task and server loop to stop.
    pub async fn stop(&self) {
        info!("Stopping service components...");
        {
            let mut running = self.is_running.write().await;
            *running = false;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Await background task completion, bounded by the configured
    /// shutdown timeout.
    pub async fn join_background_tasks(&self) {
        let timeout = self.config.shutdown_timeout();
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Background task panicked: {}", err),
                Err(_) => warn!("Background task did not stop within {:?}", timeout),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_lifecycle() {
        let state = AppState::new(AppConfig::default()).unwrap();
        assert!(!state.is_running().await);

        state.start().await.unwrap();
        assert!(state.is_running().await);

        state.stop().await;
        assert!(!state.is_running().await);
        state.join_background_tasks().await;
    }

    #[tokio::test]
    async fn test_backend_selection() {
        let mut config = AppConfig::default();
        config.server.queue_backend = QueueBackendKind::Expiring;

        let state = AppState::new(config).unwrap();
        // The expiring backend reports prune support through a real sweep
        assert_eq!(state.store.prune_expired().await.unwrap(), 0);
    }
}
