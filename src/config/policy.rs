//! Matchmaking policy settings and karma reward constants
//!
//! The karma reward constants exist in two observed variants; both are
//! named here and the effective values are overridable fields so the
//! integrating system chooses explicitly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Starting karma for a fresh account.
pub const KARMA_INITIAL: i64 = 100;

/// Chat-completion reward variants. `PolicySettings::chat_completion_reward`
/// selects the effective value.
pub const CHAT_COMPLETION_REWARD_DISABLED: i64 = 0;
pub const CHAT_COMPLETION_REWARD_STANDARD: i64 = 2;

/// Daily-login reward variants.
pub const DAILY_LOGIN_REWARD_DISABLED: i64 = 0;
pub const DAILY_LOGIN_REWARD_STANDARD: i64 = 1;

/// Karma thresholds for deriving access tiers.
pub const KARMA_FULL_ACCESS: i64 = 100;
pub const KARMA_STANDARD_ACCESS: i64 = 50;
pub const KARMA_TEMP_BAN: i64 = 25;
pub const KARMA_PERMANENT_BAN: i64 = 0;

/// What to do when the gender classifier fails.
///
/// The original system silently substituted a uniformly random label on
/// classifier errors; that behavior is preserved only as an explicit
/// opt-in, never as a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFallback {
    /// Reject verification when the classifier fails.
    Deny,
    /// Assign a uniformly random concrete gender (logged loudly).
    RandomLabel,
}

/// Matchmaking policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Minimum seconds between successive queue-join attempts
    pub queue_cooldown_seconds: u64,
    /// Daily ceiling on non-"any" queue requests
    pub daily_specific_filter_limit: u32,
    /// Maximum relayed message length in characters
    pub max_message_length: usize,
    /// Queue entry TTL for the expiring backend (seconds, 300-3600)
    pub queue_entry_expiry_seconds: u64,
    /// Karma awarded on clean chat completion
    pub chat_completion_reward: i64,
    /// Karma awarded on first login of the day
    pub daily_login_reward: i64,
    /// Behavior when the gender classifier fails
    pub classifier_fallback: ClassifierFallback,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            queue_cooldown_seconds: 10,
            daily_specific_filter_limit: 5,
            max_message_length: 1000,
            queue_entry_expiry_seconds: 300,
            chat_completion_reward: CHAT_COMPLETION_REWARD_STANDARD,
            daily_login_reward: DAILY_LOGIN_REWARD_STANDARD,
            classifier_fallback: ClassifierFallback::Deny,
        }
    }
}

impl PolicySettings {
    /// Get the queue cooldown as a Duration
    pub fn queue_cooldown(&self) -> Duration {
        Duration::from_secs(self.queue_cooldown_seconds)
    }

    /// Get the queue entry TTL as a Duration
    pub fn queue_entry_expiry(&self) -> Duration {
        Duration::from_secs(self.queue_entry_expiry_seconds)
    }
}
