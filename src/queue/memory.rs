//! In-memory queue store implementation

use crate::error::{ChatError, Result};
use crate::queue::store::{QueueStats, QueueStore};
use crate::types::{BucketSelector, Gender, QueueBucket, QueueEntry};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::debug;

/// Plain in-memory FIFO buckets guarded by one lock.
///
/// All read-then-write operations on the buckets run inside a single
/// exclusion domain, so a scan snapshot can never observe an entry that
/// a concurrent removal already claimed.
pub struct MemoryQueueStore {
    buckets: RwLock<HashMap<QueueBucket, VecDeque<QueueEntry>>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        let mut buckets = HashMap::new();
        for bucket in QueueBucket::all() {
            buckets.insert(bucket, VecDeque::new());
        }
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    /// Remove every entry failing the predicate, returning how many were
    /// dropped. Used by the expiring wrapper.
    pub(crate) fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&QueueEntry) -> bool,
    {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| ChatError::lock("queue buckets"))?;

        let mut removed = 0;
        for queue in buckets.values_mut() {
            let before = queue.len();
            queue.retain(|entry| keep(entry));
            removed += before - queue.len();
        }
        Ok(removed)
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        let bucket = entry.bucket();
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| ChatError::lock("queue buckets"))?;

        debug!(
            "Enqueued {} into {} bucket (looking_for: {})",
            crate::utils::short_id(&entry.device_id),
            bucket,
            entry.looking_for
        );
        buckets.entry(bucket).or_default().push_back(entry);
        Ok(())
    }

    async fn remove(&self, device_id: &str, gender: Option<Gender>) -> Result<bool> {
        let bucket = QueueBucket::for_gender(gender);
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| ChatError::lock("queue buckets"))?;

        let queue = match buckets.get_mut(&bucket) {
            Some(queue) => queue,
            None => return Ok(false),
        };

        if let Some(pos) = queue.iter().position(|e| e.device_id == device_id) {
            queue.remove(pos);
            debug!(
                "Removed {} from {} bucket",
                crate::utils::short_id(device_id),
                bucket
            );
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn scan(&self, selector: BucketSelector) -> Result<Vec<QueueEntry>> {
        let buckets = self
            .buckets
            .read()
            .map_err(|_| ChatError::lock("queue buckets"))?;

        let snapshot = match selector {
            BucketSelector::Bucket(bucket) => buckets
                .get(&bucket)
                .map(|queue| queue.iter().cloned().collect())
                .unwrap_or_default(),
            BucketSelector::Any => QueueBucket::all()
                .iter()
                .flat_map(|bucket| {
                    buckets
                        .get(bucket)
                        .into_iter()
                        .flat_map(|queue| queue.iter().cloned())
                })
                .collect(),
        };

        Ok(snapshot)
    }

    async fn stats(&self) -> Result<QueueStats> {
        let buckets = self
            .buckets
            .read()
            .map_err(|_| ChatError::lock("queue buckets"))?;

        Ok(QueueStats {
            male: buckets.get(&QueueBucket::Male).map_or(0, VecDeque::len),
            female: buckets.get(&QueueBucket::Female).map_or(0, VecDeque::len),
            other: buckets.get(&QueueBucket::Other).map_or(0, VecDeque::len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Preference;

    fn entry(device_id: &str, gender: Option<Gender>, looking_for: Preference) -> QueueEntry {
        QueueEntry::new(device_id.to_string(), gender, looking_for)
    }

    #[tokio::test]
    async fn test_enqueue_routes_to_gender_bucket() {
        let store = MemoryQueueStore::new();

        store
            .enqueue(entry("m1", Some(Gender::Male), Preference::Any))
            .await
            .unwrap();
        store
            .enqueue(entry("f1", Some(Gender::Female), Preference::Any))
            .await
            .unwrap();
        store
            .enqueue(entry("x1", None, Preference::Any))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.male, 1);
        assert_eq!(stats.female, 1);
        assert_eq!(stats.other, 1);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn test_scan_preserves_fifo_order() {
        let store = MemoryQueueStore::new();

        for id in ["a", "b", "c"] {
            store
                .enqueue(entry(id, Some(Gender::Male), Preference::Any))
                .await
                .unwrap();
        }

        let snapshot = store
            .scan(BucketSelector::Bucket(QueueBucket::Male))
            .await
            .unwrap();
        let ids: Vec<&str> = snapshot.iter().map(|e| e.device_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_scan_any_spans_all_buckets() {
        let store = MemoryQueueStore::new();

        store
            .enqueue(entry("m1", Some(Gender::Male), Preference::Any))
            .await
            .unwrap();
        store
            .enqueue(entry("f1", Some(Gender::Female), Preference::Any))
            .await
            .unwrap();
        store
            .enqueue(entry("x1", None, Preference::Any))
            .await
            .unwrap();

        let snapshot = store.scan(BucketSelector::Any).await.unwrap();
        assert_eq!(snapshot.len(), 3);

        let specific = store
            .scan(BucketSelector::Bucket(QueueBucket::Female))
            .await
            .unwrap();
        assert_eq!(specific.len(), 1);
        assert_eq!(specific[0].device_id, "f1");
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let store = MemoryQueueStore::new();

        assert!(!store.remove("ghost", Some(Gender::Male)).await.unwrap());

        store
            .enqueue(entry("m1", Some(Gender::Male), Preference::Any))
            .await
            .unwrap();
        assert!(store.remove("m1", Some(Gender::Male)).await.unwrap());
        // Second removal is a safe no-op
        assert!(!store.remove("m1", Some(Gender::Male)).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_only_touches_matching_bucket() {
        let store = MemoryQueueStore::new();

        store
            .enqueue(entry("m1", Some(Gender::Male), Preference::Any))
            .await
            .unwrap();

        // Wrong bucket: entry stays put
        assert!(!store.remove("m1", Some(Gender::Female)).await.unwrap());
        assert_eq!(store.stats().await.unwrap().male, 1);
    }
}
