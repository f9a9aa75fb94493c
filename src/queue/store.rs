//! Queue store contract
//!
//! All operations report "not found" conditions through boolean or empty
//! results; none of them error for an absent participant.

use crate::error::Result;
use crate::types::{BucketSelector, Gender, QueueEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-bucket queue sizes, used only for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub male: usize,
    pub female: usize,
    pub other: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.male + self.female + self.other
    }
}

/// Storage contract for pending match requests.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an entry to the bucket for its own gender (catch-all when
    /// the gender is not concrete). No dedup check; the caller ensures
    /// at-most-once membership.
    async fn enqueue(&self, entry: QueueEntry) -> Result<()>;

    /// Remove the first entry for `device_id` from the bucket implied by
    /// `gender`. Returns whether a removal occurred; absent participants
    /// are a no-op, not an error.
    async fn remove(&self, device_id: &str, gender: Option<Gender>) -> Result<bool>;

    /// Snapshot of current entries in FIFO order (oldest first). For
    /// `BucketSelector::Any` the snapshot spans all buckets; no ordering
    /// is guaranteed across buckets.
    async fn scan(&self, selector: BucketSelector) -> Result<Vec<QueueEntry>>;

    /// Per-bucket counts for observability.
    async fn stats(&self) -> Result<QueueStats>;

    /// Drop entries past their TTL, returning how many were removed
    /// since the last call (implicit sweeps on other operations
    /// included). Backends without expiry keep the default no-op.
    async fn prune_expired(&self) -> Result<usize> {
        Ok(0)
    }
}
