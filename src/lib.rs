//! Cloak Room - Anonymous one-on-one chat matchmaking service
//!
//! This crate pairs verified participants through gender-preference FIFO
//! queues, relays messages between matched partners over WebSocket, and
//! enforces queueing policy (cooldowns and daily filter quotas).

pub mod account;
pub mod config;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;
pub mod verify;

// Re-export commonly used types and traits
pub use error::{ChatError, Result};
pub use types::*;

// Re-export key components
pub use matching::MatchEngine;
pub use queue::QueueStore;
pub use session::{ChatSession, SessionRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
