//! TTL-bounded queue store
//!
//! Wraps the in-memory store with a per-entry time-to-live so entries
//! orphaned by missed cleanup cannot linger forever. The TTL is a safety
//! net on top of explicit removal, not a replacement for it.

use crate::error::Result;
use crate::queue::memory::MemoryQueueStore;
use crate::queue::store::{QueueStats, QueueStore};
use crate::types::{BucketSelector, Gender, QueueEntry};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

pub struct ExpiringQueueStore {
    inner: MemoryQueueStore,
    ttl: ChronoDuration,
    /// Entries swept since the last `prune_expired` call, so implicit
    /// sweeps on reads and writes still show up in the expiry count.
    swept: AtomicU64,
}

impl ExpiringQueueStore {
    /// `ttl` values below one second are clamped up to one second.
    pub fn new(ttl: Duration) -> Self {
        let secs = ttl.as_secs().max(1);
        Self {
            inner: MemoryQueueStore::new(),
            ttl: ChronoDuration::seconds(secs as i64),
            swept: AtomicU64::new(0),
        }
    }

    fn sweep(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.ttl;
        let removed = self.inner.retain(|entry| entry.joined_at > cutoff)?;
        if removed > 0 {
            self.swept.fetch_add(removed as u64, Ordering::Relaxed);
            info!("Expired {} stale queue entries", removed);
        }
        Ok(removed)
    }
}

#[async_trait]
impl QueueStore for ExpiringQueueStore {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        self.sweep()?;
        self.inner.enqueue(entry).await
    }

    async fn remove(&self, device_id: &str, gender: Option<Gender>) -> Result<bool> {
        self.sweep()?;
        self.inner.remove(device_id, gender).await
    }

    async fn scan(&self, selector: BucketSelector) -> Result<Vec<QueueEntry>> {
        self.sweep()?;
        self.inner.scan(selector).await
    }

    async fn stats(&self) -> Result<QueueStats> {
        self.sweep()?;
        self.inner.stats().await
    }

    async fn prune_expired(&self) -> Result<usize> {
        self.sweep()?;
        Ok(self.swept.swap(0, Ordering::Relaxed) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, Preference, QueueBucket};
    use tokio_test::assert_ok;

    fn aged_entry(device_id: &str, age_seconds: i64) -> QueueEntry {
        QueueEntry {
            device_id: device_id.to_string(),
            gender: Some(Gender::Male),
            looking_for: Preference::Any,
            joined_at: Utc::now() - ChronoDuration::seconds(age_seconds),
        }
    }

    #[tokio::test]
    async fn test_fresh_entries_survive_sweep() {
        let store = ExpiringQueueStore::new(Duration::from_secs(300));
        assert_ok!(store.inner.enqueue(aged_entry("fresh", 10)).await);

        assert_eq!(store.prune_expired().await.unwrap(), 0);
        assert_eq!(store.stats().await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn test_stale_entries_are_pruned() {
        let store = ExpiringQueueStore::new(Duration::from_secs(300));
        store.inner.enqueue(aged_entry("stale", 301)).await.unwrap();
        store.inner.enqueue(aged_entry("fresh", 5)).await.unwrap();

        assert_eq!(store.prune_expired().await.unwrap(), 1);

        let snapshot = store
            .scan(BucketSelector::Bucket(QueueBucket::Male))
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].device_id, "fresh");
    }

    #[tokio::test]
    async fn test_implicit_sweeps_are_reported_by_prune() {
        let store = ExpiringQueueStore::new(Duration::from_secs(300));
        store.inner.enqueue(aged_entry("stale", 400)).await.unwrap();

        // A read sweeps the entry out before any explicit prune runs
        assert!(store.scan(BucketSelector::Any).await.unwrap().is_empty());

        // The next prune still accounts for it, exactly once
        assert_eq!(store.prune_expired().await.unwrap(), 1);
        assert_eq!(store.prune_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scan_never_returns_expired_entries() {
        let store = ExpiringQueueStore::new(Duration::from_secs(300));
        store
            .inner
            .enqueue(aged_entry("ancient", 4000))
            .await
            .unwrap();

        // Sweep happens implicitly on every read
        let snapshot = store.scan(BucketSelector::Any).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
