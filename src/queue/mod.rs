//! Queue storage for pending match requests
//!
//! Pending requests live in FIFO buckets keyed by the requester's own
//! gender. Two implementations of the same contract are provided and
//! selected at process start; nothing downstream branches on the backend.

pub mod expiring;
pub mod memory;
pub mod store;

pub use expiring::ExpiringQueueStore;
pub use memory::MemoryQueueStore;
pub use store::{QueueStats, QueueStore};
