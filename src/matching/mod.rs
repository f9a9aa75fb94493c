//! Mutual-compatibility matching
//!
//! The engine walks the queue buckets a requester's preference reaches
//! and claims the first candidate whose preference also accepts the
//! requester. Claims run under a single lock so two concurrent searches
//! can never pair against the same pending entry.

pub mod engine;

pub use engine::{is_match, MatchEngine};
