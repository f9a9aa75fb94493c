//! Utility functions for the chat matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a unique per-process instance id (used in logs and stats).
pub fn generate_instance_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Shorten a device id for logging without exposing the whole token.
pub fn short_id(device_id: &str) -> &str {
    let end = device_id
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(device_id.len());
    &device_id[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_instance_ids() {
        let id1 = generate_instance_id();
        let id2 = generate_instance_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abcdefghijklmnop"), "abcdefghijkl");
        assert_eq!(short_id("short"), "short");
        assert_eq!(short_id(""), "");
    }
}
