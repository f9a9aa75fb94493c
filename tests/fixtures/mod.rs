//! Test fixtures for integration testing
//!
//! Builds a complete in-process system (registry, queue store, engine,
//! accounts, metrics) and hands out connected sessions the way the
//! WebSocket layer would.

use cloak_room::account::{AccountStore, MemoryAccountStore};
use cloak_room::config::PolicySettings;
use cloak_room::matching::MatchEngine;
use cloak_room::metrics::MetricsCollector;
use cloak_room::queue::{MemoryQueueStore, QueueStore};
use cloak_room::session::{ChatSession, SessionRegistry};
use cloak_room::types::{Gender, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct TestSystem {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn QueueStore>,
    pub engine: Arc<MatchEngine>,
    pub accounts: Arc<MemoryAccountStore>,
    pub metrics: Arc<MetricsCollector>,
    pub policy: PolicySettings,
}

impl TestSystem {
    /// Cooldown-free system; most scenarios need rapid rejoins.
    pub fn new() -> Self {
        Self::with_policy(PolicySettings {
            queue_cooldown_seconds: 0,
            ..Default::default()
        })
    }

    pub fn with_policy(policy: PolicySettings) -> Self {
        let registry = Arc::new(SessionRegistry::new(policy.queue_cooldown()));
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let engine = Arc::new(MatchEngine::new(Arc::clone(&store), Arc::clone(&registry)));
        let accounts = Arc::new(MemoryAccountStore::new(policy.clone()));
        let metrics = Arc::new(MetricsCollector::new().expect("metrics"));
        Self {
            registry,
            store,
            engine,
            accounts,
            metrics,
            policy,
        }
    }

    /// Create a verified account and register a live connection for it,
    /// mirroring what the socket handshake does.
    pub fn connect(
        &self,
        device_id: &str,
        gender_label: &str,
    ) -> (ChatSession, mpsc::UnboundedReceiver<ServerEvent>) {
        self.accounts
            .insert_verified(device_id, gender_label)
            .expect("account insert");

        let (tx, rx) = mpsc::unbounded_channel();
        let epoch = self
            .registry
            .register_connection(device_id, tx)
            .expect("register");

        let session = ChatSession::new(
            device_id.to_string(),
            Gender::from_label(gender_label),
            epoch,
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            Arc::clone(&self.engine),
            Arc::clone(&self.accounts) as Arc<dyn AccountStore>,
            self.policy.clone(),
            Arc::clone(&self.metrics),
        );
        (session, rx)
    }
}

/// Pull every buffered event off a receiver.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Count events of a given wire type name.
pub fn count_events_of_type(events: &[ServerEvent], event_type: &str) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(
                (event, event_type),
                (ServerEvent::Connected { .. }, "connected")
                    | (ServerEvent::Queued { .. }, "queued")
                    | (ServerEvent::LeftQueue, "left_queue")
                    | (ServerEvent::MatchFound { .. }, "match_found")
                    | (ServerEvent::Message { .. }, "message")
                    | (ServerEvent::PartnerLeft, "partner_left")
                    | (ServerEvent::ChatEnded, "chat_ended")
                    | (ServerEvent::Error { .. }, "error")
            )
        })
        .count()
}
