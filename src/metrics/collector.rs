//! Metrics collection and registration

use crate::error::Result;
use crate::queue::QueueStats;
use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

/// Connection lifecycle metrics
pub struct ConnectionMetrics {
    pub active_connections: IntGauge,
    pub connections_total: IntCounter,
    pub rejected_handshakes_total: IntCounterVec,
}

/// Queue depth and churn metrics
pub struct QueueMetrics {
    pub queue_depth: IntGaugeVec,
    pub joins_total: IntCounter,
    pub join_rejections_total: IntCounterVec,
    pub expired_entries_total: IntCounter,
}

/// Matching outcome metrics
pub struct MatchMetrics {
    pub matches_total: IntCounter,
    pub chats_ended_total: IntCounter,
}

/// Message relay metrics
pub struct RelayMetrics {
    pub messages_relayed_total: IntCounter,
    pub dropped_messages_total: IntCounter,
}

pub struct MetricsCollector {
    registry: Registry,
    pub connections: ConnectionMetrics,
    pub queue: QueueMetrics,
    pub matches: MatchMetrics,
    pub relay: RelayMetrics,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> Result<Self> {
        let connections = ConnectionMetrics {
            active_connections: IntGauge::with_opts(Opts::new(
                "chat_active_connections",
                "Number of currently connected participants",
            ))?,
            connections_total: IntCounter::with_opts(Opts::new(
                "chat_connections_total",
                "Total accepted connections",
            ))?,
            rejected_handshakes_total: IntCounterVec::new(
                Opts::new(
                    "chat_rejected_handshakes_total",
                    "Connection handshakes rejected, by reason",
                ),
                &["reason"],
            )?,
        };

        let queue = QueueMetrics {
            queue_depth: IntGaugeVec::new(
                Opts::new("chat_queue_depth", "Pending match requests, by bucket"),
                &["bucket"],
            )?,
            joins_total: IntCounter::with_opts(Opts::new(
                "chat_queue_joins_total",
                "Total accepted queue joins",
            ))?,
            join_rejections_total: IntCounterVec::new(
                Opts::new(
                    "chat_queue_join_rejections_total",
                    "Queue joins rejected by policy, by reason",
                ),
                &["reason"],
            )?,
            expired_entries_total: IntCounter::with_opts(Opts::new(
                "chat_queue_expired_entries_total",
                "Queue entries dropped by TTL expiry",
            ))?,
        };

        let matches = MatchMetrics {
            matches_total: IntCounter::with_opts(Opts::new(
                "chat_matches_total",
                "Total pairings established",
            ))?,
            chats_ended_total: IntCounter::with_opts(Opts::new(
                "chat_chats_ended_total",
                "Total chats ended by either side",
            ))?,
        };

        let relay = RelayMetrics {
            messages_relayed_total: IntCounter::with_opts(Opts::new(
                "chat_messages_relayed_total",
                "Messages relayed between partners",
            ))?,
            dropped_messages_total: IntCounter::with_opts(Opts::new(
                "chat_dropped_messages_total",
                "Messages dropped for being empty or oversized",
            ))?,
        };

        registry.register(Box::new(connections.active_connections.clone()))?;
        registry.register(Box::new(connections.connections_total.clone()))?;
        registry.register(Box::new(connections.rejected_handshakes_total.clone()))?;
        registry.register(Box::new(queue.queue_depth.clone()))?;
        registry.register(Box::new(queue.joins_total.clone()))?;
        registry.register(Box::new(queue.join_rejections_total.clone()))?;
        registry.register(Box::new(queue.expired_entries_total.clone()))?;
        registry.register(Box::new(matches.matches_total.clone()))?;
        registry.register(Box::new(matches.chats_ended_total.clone()))?;
        registry.register(Box::new(relay.messages_relayed_total.clone()))?;
        registry.register(Box::new(relay.dropped_messages_total.clone()))?;

        Ok(Self {
            registry,
            connections,
            queue,
            matches,
            relay,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Refresh the per-bucket depth gauges from a stats snapshot.
    pub fn update_queue_depth(&self, stats: &QueueStats) {
        self.queue
            .queue_depth
            .with_label_values(&["male"])
            .set(stats.male as i64);
        self.queue
            .queue_depth
            .with_label_values(&["female"])
            .set(stats.female as i64);
        self.queue
            .queue_depth
            .with_label_values(&["other"])
            .set(stats.other as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_cleanly() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.connections.connections_total.inc();
        metrics.matches.matches_total.inc();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_queue_depth_gauges() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.update_queue_depth(&QueueStats {
            male: 3,
            female: 1,
            other: 0,
        });
        assert_eq!(
            metrics.queue.queue_depth.with_label_values(&["male"]).get(),
            3
        );
        assert_eq!(
            metrics
                .queue
                .queue_depth
                .with_label_values(&["female"])
                .get(),
            1
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        assert!(MetricsCollector::with_registry(registry.clone()).is_ok());
        assert!(MetricsCollector::with_registry(registry).is_err());
    }
}
