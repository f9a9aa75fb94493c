//! Account store trait and in-memory implementation

use crate::config::PolicySettings;
use crate::error::{ChatError, Result};
use crate::types::{AccessLevel, AccountRecord, DeviceId};
use crate::config::policy::{
    KARMA_FULL_ACCESS, KARMA_INITIAL, KARMA_PERMANENT_BAN, KARMA_STANDARD_ACCESS, KARMA_TEMP_BAN,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// Read and update participant accounts.
///
/// Every method can fail when the backing system is unreachable; callers
/// treat failures as "deny the operation", never as a crash.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch the account snapshot for a device, `None` when unknown.
    async fn lookup(&self, device_id: &str) -> Result<Option<AccountRecord>>;

    /// Current access tier for a device.
    async fn access_level(&self, device_id: &str) -> Result<AccessLevel>;

    /// Bump the daily specific-filter counter, returning the new count.
    async fn increment_daily_filter_count(&self, device_id: &str) -> Result<u32>;

    /// Record a completed pairing for both participants.
    async fn increment_match_count(&self, first: &str, second: &str) -> Result<()>;

    /// Award the chat-completion karma reward to one participant.
    async fn award_chat_completion(&self, device_id: &str) -> Result<()>;

    /// Award the once-per-day login reward.
    async fn record_daily_login(&self, device_id: &str) -> Result<()>;
}

/// Access tier derived purely from karma thresholds.
pub fn access_level_for_karma(karma: i64) -> AccessLevel {
    if karma >= KARMA_FULL_ACCESS {
        AccessLevel::Full
    } else if karma >= KARMA_STANDARD_ACCESS {
        AccessLevel::Standard
    } else if karma > KARMA_TEMP_BAN {
        AccessLevel::Warning
    } else if karma > KARMA_PERMANENT_BAN {
        AccessLevel::TempBan
    } else {
        AccessLevel::PermanentBan
    }
}

#[derive(Default)]
struct MemoryAccountState {
    accounts: HashMap<DeviceId, AccountRecord>,
    completion_awards: HashMap<DeviceId, u32>,
    login_awards: HashMap<DeviceId, u32>,
}

/// In-memory account store for tests and local runs.
pub struct MemoryAccountStore {
    state: RwLock<MemoryAccountState>,
    policy: PolicySettings,
}

impl MemoryAccountStore {
    pub fn new(policy: PolicySettings) -> Self {
        Self {
            state: RwLock::new(MemoryAccountState::default()),
            policy,
        }
    }

    /// Insert a fully-specified account record.
    pub fn insert(&self, record: AccountRecord) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ChatError::lock("account state"))?;
        state.accounts.insert(record.device_id.clone(), record);
        Ok(())
    }

    /// Create a verified account with default karma and the given label.
    pub fn insert_verified(&self, device_id: &str, gender_label: &str) -> Result<()> {
        self.insert(AccountRecord {
            device_id: device_id.to_string(),
            gender_label: Some(gender_label.to_string()),
            nickname: None,
            bio: None,
            karma: KARMA_INITIAL,
            daily_specific_filter_count: 0,
            daily_matches_count: 0,
        })
    }

    /// How many chat-completion rewards a device has received.
    pub fn completion_awards(&self, device_id: &str) -> Result<u32> {
        let state = self
            .state
            .read()
            .map_err(|_| ChatError::lock("account state"))?;
        Ok(state
            .completion_awards
            .get(device_id)
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn lookup(&self, device_id: &str) -> Result<Option<AccountRecord>> {
        let state = self
            .state
            .read()
            .map_err(|_| ChatError::lock("account state"))?;
        Ok(state.accounts.get(device_id).cloned())
    }

    async fn access_level(&self, device_id: &str) -> Result<AccessLevel> {
        let state = self
            .state
            .read()
            .map_err(|_| ChatError::lock("account state"))?;
        let account = state
            .accounts
            .get(device_id)
            .ok_or_else(|| ChatError::ParticipantNotFound {
                device_id: device_id.to_string(),
            })?;
        Ok(access_level_for_karma(account.karma))
    }

    async fn increment_daily_filter_count(&self, device_id: &str) -> Result<u32> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ChatError::lock("account state"))?;
        let account = state
            .accounts
            .get_mut(device_id)
            .ok_or_else(|| ChatError::ParticipantNotFound {
                device_id: device_id.to_string(),
            })?;
        account.daily_specific_filter_count += 1;
        Ok(account.daily_specific_filter_count)
    }

    async fn increment_match_count(&self, first: &str, second: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ChatError::lock("account state"))?;
        for device_id in [first, second] {
            if let Some(account) = state.accounts.get_mut(device_id) {
                account.daily_matches_count += 1;
            }
        }
        Ok(())
    }

    async fn award_chat_completion(&self, device_id: &str) -> Result<()> {
        let reward = self.policy.chat_completion_reward;
        let mut guard = self
            .state
            .write()
            .map_err(|_| ChatError::lock("account state"))?;
        let state = &mut *guard;
        if let Some(account) = state.accounts.get_mut(device_id) {
            account.karma += reward;
            *state
                .completion_awards
                .entry(device_id.to_string())
                .or_insert(0) += 1;
            info!(
                "Awarded chat completion ({} karma) to {}",
                reward,
                crate::utils::short_id(device_id)
            );
        }
        Ok(())
    }

    async fn record_daily_login(&self, device_id: &str) -> Result<()> {
        let reward = self.policy.daily_login_reward;
        let mut guard = self
            .state
            .write()
            .map_err(|_| ChatError::lock("account state"))?;
        let state = &mut *guard;
        if let Some(account) = state.accounts.get_mut(device_id) {
            let awards = state
                .login_awards
                .entry(device_id.to_string())
                .or_insert(0);
            if *awards == 0 {
                account.karma += reward;
            }
            *awards += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryAccountStore {
        MemoryAccountStore::new(PolicySettings::default())
    }

    #[test]
    fn test_access_tiers() {
        assert_eq!(access_level_for_karma(150), AccessLevel::Full);
        assert_eq!(access_level_for_karma(100), AccessLevel::Full);
        assert_eq!(access_level_for_karma(99), AccessLevel::Standard);
        assert_eq!(access_level_for_karma(50), AccessLevel::Standard);
        assert_eq!(access_level_for_karma(49), AccessLevel::Warning);
        assert_eq!(access_level_for_karma(26), AccessLevel::Warning);
        assert_eq!(access_level_for_karma(25), AccessLevel::TempBan);
        assert_eq!(access_level_for_karma(1), AccessLevel::TempBan);
        assert_eq!(access_level_for_karma(0), AccessLevel::PermanentBan);
        assert_eq!(access_level_for_karma(-10), AccessLevel::PermanentBan);
    }

    #[tokio::test]
    async fn test_lookup_unknown_device() {
        let store = store();
        assert!(store.lookup("ghost").await.unwrap().is_none());
        assert!(store.access_level("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_filter_counter_increments() {
        let store = store();
        store.insert_verified("dev-1", "Man").unwrap();

        assert_eq!(store.increment_daily_filter_count("dev-1").await.unwrap(), 1);
        assert_eq!(store.increment_daily_filter_count("dev-1").await.unwrap(), 2);

        let account = store.lookup("dev-1").await.unwrap().unwrap();
        assert_eq!(account.daily_specific_filter_count, 2);
    }

    #[tokio::test]
    async fn test_chat_completion_reward_applies_policy() {
        let store = store();
        store.insert_verified("dev-1", "Woman").unwrap();

        store.award_chat_completion("dev-1").await.unwrap();

        let account = store.lookup("dev-1").await.unwrap().unwrap();
        assert_eq!(account.karma, KARMA_INITIAL + 2);
        assert_eq!(store.completion_awards("dev-1").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_daily_login_awarded_once() {
        let store = store();
        store.insert_verified("dev-1", "Man").unwrap();

        store.record_daily_login("dev-1").await.unwrap();
        store.record_daily_login("dev-1").await.unwrap();

        let account = store.lookup("dev-1").await.unwrap().unwrap();
        assert_eq!(account.karma, KARMA_INITIAL + 1);
    }

    #[tokio::test]
    async fn test_match_count_updates_both_sides() {
        let store = store();
        store.insert_verified("a", "Man").unwrap();
        store.insert_verified("b", "Woman").unwrap();

        store.increment_match_count("a", "b").await.unwrap();

        assert_eq!(
            store.lookup("a").await.unwrap().unwrap().daily_matches_count,
            1
        );
        assert_eq!(
            store.lookup("b").await.unwrap().unwrap().daily_matches_count,
            1
        );
    }
}
