//! Shared session registry
//!
//! Single owner of the live-connection map, the symmetric pairing map,
//! and the per-device cooldown stamps. Each registered connection gets a
//! monotonically increasing epoch; cleanup is only honored when the
//! epoch still matches, so a reconnect can never have its fresh state
//! torn down by the old connection's teardown.

use crate::error::{ChatError, Result};
use crate::types::{DeviceId, ServerEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct ChannelHandle {
    sender: mpsc::UnboundedSender<ServerEvent>,
    epoch: u64,
}

/// Outcome of an epoch-guarded connection removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The connection was superseded; no cleanup was performed.
    Stale,
    /// The connection was removed, along with its pairing if any.
    Removed { partner: Option<DeviceId> },
}

pub struct SessionRegistry {
    connections: RwLock<HashMap<DeviceId, ChannelHandle>>,
    pairs: RwLock<HashMap<DeviceId, DeviceId>>,
    cooldowns: RwLock<HashMap<DeviceId, Instant>>,
    cooldown: Duration,
    epoch_counter: AtomicU64,
}

impl SessionRegistry {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            pairs: RwLock::new(HashMap::new()),
            cooldowns: RwLock::new(HashMap::new()),
            cooldown,
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// Register a live channel for a device, superseding any previous
    /// one. Returns the epoch the caller must present at removal time.
    pub fn register_connection(
        &self,
        device_id: &str,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<u64> {
        let epoch = self.epoch_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut connections = self
            .connections
            .write()
            .map_err(|_| ChatError::lock("connections"))?;

        let previous = connections.insert(device_id.to_string(), ChannelHandle { sender, epoch });
        if previous.is_some() {
            info!(
                "Superseded existing connection for {}",
                crate::utils::short_id(device_id)
            );
        }
        Ok(epoch)
    }

    /// Remove a connection if and only if `epoch` still matches. On
    /// removal the pairing is cleared and the former partner returned so
    /// the caller can notify them.
    pub fn remove_connection(&self, device_id: &str, epoch: u64) -> Result<RemovalOutcome> {
        {
            let mut connections = self
                .connections
                .write()
                .map_err(|_| ChatError::lock("connections"))?;

            match connections.get(device_id) {
                Some(handle) if handle.epoch == epoch => {
                    connections.remove(device_id);
                }
                _ => {
                    debug!(
                        "Skipping stale cleanup for {}",
                        crate::utils::short_id(device_id)
                    );
                    return Ok(RemovalOutcome::Stale);
                }
            }
        }

        let partner = self.clear_pair(device_id)?;
        Ok(RemovalOutcome::Removed { partner })
    }

    pub fn is_connected(&self, device_id: &str) -> Result<bool> {
        let connections = self
            .connections
            .read()
            .map_err(|_| ChatError::lock("connections"))?;
        Ok(connections.contains_key(device_id))
    }

    pub fn connection_count(&self) -> Result<usize> {
        let connections = self
            .connections
            .read()
            .map_err(|_| ChatError::lock("connections"))?;
        Ok(connections.len())
    }

    /// Record a symmetric pairing between two devices.
    pub fn set_pair(&self, first: &str, second: &str) -> Result<()> {
        let mut pairs = self.pairs.write().map_err(|_| ChatError::lock("pairs"))?;
        pairs.insert(first.to_string(), second.to_string());
        pairs.insert(second.to_string(), first.to_string());
        Ok(())
    }

    pub fn partner_of(&self, device_id: &str) -> Result<Option<DeviceId>> {
        let pairs = self.pairs.read().map_err(|_| ChatError::lock("pairs"))?;
        Ok(pairs.get(device_id).cloned())
    }

    /// Tear down a pairing from either side, returning the former
    /// partner if one existed. Clearing an unpaired device is a no-op.
    pub fn clear_pair(&self, device_id: &str) -> Result<Option<DeviceId>> {
        let mut pairs = self.pairs.write().map_err(|_| ChatError::lock("pairs"))?;
        match pairs.remove(device_id) {
            Some(partner) => {
                pairs.remove(&partner);
                Ok(Some(partner))
            }
            None => Ok(None),
        }
    }

    pub fn active_pair_count(&self) -> Result<usize> {
        let pairs = self.pairs.read().map_err(|_| ChatError::lock("pairs"))?;
        Ok(pairs.len() / 2)
    }

    /// Deliver an event to a device's live channel. Returns false when
    /// the device has no channel or the channel is dead; a dead channel
    /// is torn down on the spot and its partner notified.
    pub fn send_to(&self, device_id: &str, event: ServerEvent) -> Result<bool> {
        let delivered = {
            let connections = self
                .connections
                .read()
                .map_err(|_| ChatError::lock("connections"))?;
            match connections.get(device_id) {
                Some(handle) => handle.sender.send(event).is_ok(),
                None => false,
            }
        };
        if delivered {
            return Ok(true);
        }

        let removed = {
            let mut connections = self
                .connections
                .write()
                .map_err(|_| ChatError::lock("connections"))?;
            connections.remove(device_id).is_some()
        };
        if removed {
            warn!(
                "Dropped dead channel for {}",
                crate::utils::short_id(device_id)
            );
        }

        if let Some(partner) = self.clear_pair(device_id)? {
            let connections = self
                .connections
                .read()
                .map_err(|_| ChatError::lock("connections"))?;
            if let Some(handle) = connections.get(&partner) {
                let _ = handle.sender.send(ServerEvent::PartnerLeft);
            }
        }
        Ok(false)
    }

    /// Enforce the minimum spacing between queue-join attempts.
    pub fn check_cooldown(&self, device_id: &str) -> Result<()> {
        if self.cooldown.is_zero() {
            return Ok(());
        }
        let cooldowns = self
            .cooldowns
            .read()
            .map_err(|_| ChatError::lock("cooldowns"))?;

        if let Some(last) = cooldowns.get(device_id) {
            let elapsed = last.elapsed();
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(ChatError::CooldownActive {
                    seconds: remaining.as_secs().max(1),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Stamp a successful queue join for cooldown accounting.
    pub fn mark_queued(&self, device_id: &str) -> Result<()> {
        let mut cooldowns = self
            .cooldowns
            .write()
            .map_err(|_| ChatError::lock("cooldowns"))?;
        cooldowns.insert(device_id.to_string(), Instant::now());
        Ok(())
    }
}
