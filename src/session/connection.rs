//! Per-connection chat session
//!
//! One `ChatSession` drives a single participant's event flow: admission,
//! queue joins under policy, match establishment, message relay, and
//! exactly-once disconnect cleanup. A session holds no chat state of its
//! own beyond identity and epoch; whether it is idle, queued, or chatting
//! is always derived from the registry and the queue store, so a
//! partner's actions take effect without any local transition.

use crate::account::store::access_level_for_karma;
use crate::account::AccountStore;
use crate::config::PolicySettings;
use crate::error::{ChatError, Result};
use crate::matching::MatchEngine;
use crate::metrics::MetricsCollector;
use crate::queue::QueueStore;
use crate::session::registry::{RemovalOutcome, SessionRegistry};
use crate::types::{
    AccountRecord, ClientEvent, DeviceId, Gender, PartnerProfile, Preference, QueueEntry,
    RejectReason, ServerEvent,
};
use anyhow::anyhow;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of the channel-open handshake.
#[derive(Debug, Clone)]
pub enum Admission {
    Granted(AccountRecord),
    Rejected(RejectReason),
}

/// Decide whether a device may open the chat channel.
///
/// Collaborator failure denies admission; it never surfaces as a crash.
pub async fn admit(accounts: &Arc<dyn AccountStore>, device_id: &str) -> Admission {
    let record = match accounts.lookup(device_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Admission::Rejected(RejectReason::UnknownParticipant),
        Err(err) => {
            warn!(
                "Account lookup failed for {}: {}",
                crate::utils::short_id(device_id),
                err
            );
            return Admission::Rejected(RejectReason::UnknownParticipant);
        }
    };

    // A ban outranks incomplete verification.
    match accounts.access_level(device_id).await {
        Ok(level) if level.is_banned() => {
            return Admission::Rejected(RejectReason::AccessDenied(level));
        }
        Ok(_) => {}
        Err(err) => {
            warn!(
                "Access check failed for {}: {}",
                crate::utils::short_id(device_id),
                err
            );
            return Admission::Rejected(RejectReason::AccessDenied(access_level_for_karma(
                record.karma,
            )));
        }
    }

    if !record.verified() {
        return Admission::Rejected(RejectReason::VerificationIncomplete);
    }

    Admission::Granted(record)
}

pub struct ChatSession {
    device_id: DeviceId,
    gender: Option<Gender>,
    epoch: u64,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn QueueStore>,
    engine: Arc<MatchEngine>,
    accounts: Arc<dyn AccountStore>,
    policy: PolicySettings,
    metrics: Arc<MetricsCollector>,
    closed: bool,
}

impl ChatSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: DeviceId,
        gender: Option<Gender>,
        epoch: u64,
        registry: Arc<SessionRegistry>,
        store: Arc<dyn QueueStore>,
        engine: Arc<MatchEngine>,
        accounts: Arc<dyn AccountStore>,
        policy: PolicySettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            device_id,
            gender,
            epoch,
            registry,
            store,
            engine,
            accounts,
            policy,
            metrics,
            closed: false,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Dispatch one inbound event. Errors are reportable to the sender;
    /// the channel stays open either way.
    pub async fn handle_event(&mut self, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::JoinQueue { looking_for } => self.join_queue(looking_for).await,
            ClientEvent::LeaveQueue => self.leave_queue().await,
            ClientEvent::SendMessage { content } => self.send_message(content).await,
            ClientEvent::LeaveChat => self.leave_chat(true).await,
            ClientEvent::NextMatch { looking_for } => {
                self.leave_chat(true).await?;
                self.join_queue(looking_for).await
            }
        }
    }

    /// Join the matchmaking queue, then immediately search for a partner.
    pub async fn join_queue(&mut self, looking_for: Preference) -> Result<()> {
        if self.registry.partner_of(&self.device_id)?.is_some() {
            return Err(anyhow!("Already in a chat. Leave it before queueing."));
        }

        if let Err(err) = self.registry.check_cooldown(&self.device_id) {
            self.metrics
                .queue
                .join_rejections_total
                .with_label_values(&["cooldown"])
                .inc();
            return Err(err);
        }

        // Specific filters are quota'd; the counter only moves on joins
        // that actually proceed.
        if looking_for.is_specific() {
            let record = self
                .accounts
                .lookup(&self.device_id)
                .await
                .map_err(|err| ChatError::AccountStoreFailed {
                    message: err.to_string(),
                })?
                .ok_or_else(|| ChatError::ParticipantNotFound {
                    device_id: self.device_id.clone(),
                })?;

            if record.daily_specific_filter_count >= self.policy.daily_specific_filter_limit {
                self.metrics
                    .queue
                    .join_rejections_total
                    .with_label_values(&["filter_limit"])
                    .inc();
                return Err(ChatError::DailyFilterLimitReached.into());
            }
            self.accounts
                .increment_daily_filter_count(&self.device_id)
                .await
                .map_err(|err| ChatError::AccountStoreFailed {
                    message: err.to_string(),
                })?;
        }

        // Re-joining replaces any stale own entry; membership stays
        // at most one.
        self.store.remove(&self.device_id, self.gender).await?;

        let entry = QueueEntry::new(self.device_id.clone(), self.gender, looking_for);
        self.store.enqueue(entry.clone()).await?;
        self.registry.mark_queued(&self.device_id)?;
        self.metrics.queue.joins_total.inc();

        self.registry
            .send_to(&self.device_id, ServerEvent::Queued { looking_for })?;

        if let Some(candidate) = self.engine.find_match(&entry).await? {
            self.establish_match(candidate).await?;
        }
        Ok(())
    }

    /// Deliver match events to both sides of a freshly claimed pairing.
    async fn establish_match(&self, candidate: QueueEntry) -> Result<()> {
        let own = self.accounts.lookup(&self.device_id).await;
        let theirs = self.accounts.lookup(&candidate.device_id).await;

        let (own, theirs) = match (own, theirs) {
            (Ok(Some(own)), Ok(Some(theirs))) => (own, theirs),
            _ => {
                // The pairing is already recorded; roll it back rather
                // than leave a half-announced chat. The candidate's queue
                // entry is already consumed, so they must hear about the
                // failure too.
                warn!(
                    "Profile lookup failed after claiming match for {}",
                    crate::utils::short_id(&self.device_id)
                );
                self.registry.clear_pair(&self.device_id)?;
                let notice = ServerEvent::Error {
                    message: "Match could not be completed. Please try again.".to_string(),
                };
                self.registry.send_to(&self.device_id, notice.clone())?;
                self.registry.send_to(&candidate.device_id, notice)?;
                return Ok(());
            }
        };

        self.registry.send_to(
            &self.device_id,
            ServerEvent::MatchFound {
                partner: PartnerProfile::from_account(&theirs),
            },
        )?;
        self.registry.send_to(
            &candidate.device_id,
            ServerEvent::MatchFound {
                partner: PartnerProfile::from_account(&own),
            },
        )?;

        if let Err(err) = self
            .accounts
            .increment_match_count(&self.device_id, &candidate.device_id)
            .await
        {
            warn!("Failed to record match count: {}", err);
        }
        self.metrics.matches.matches_total.inc();
        Ok(())
    }

    /// Relay a message to the current partner. Empty and oversized
    /// payloads are dropped without feedback.
    pub async fn send_message(&self, content: String) -> Result<()> {
        let partner = self
            .registry
            .partner_of(&self.device_id)?
            .ok_or_else(|| anyhow!("You are not in a chat."))?;

        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.chars().count() > self.policy.max_message_length {
            self.metrics.relay.dropped_messages_total.inc();
            return Ok(());
        }

        self.registry.send_to(
            &partner,
            ServerEvent::Message {
                from: "partner".to_string(),
                content: trimmed.to_string(),
                timestamp: crate::utils::current_timestamp(),
            },
        )?;
        self.metrics.relay.messages_relayed_total.inc();
        Ok(())
    }

    /// End the current chat. The leaver is credited for completing it;
    /// the partner is told only when `notify_partner` is set.
    pub async fn leave_chat(&self, notify_partner: bool) -> Result<()> {
        if let Some(partner) = self.registry.clear_pair(&self.device_id)? {
            if let Err(err) = self.accounts.award_chat_completion(&self.device_id).await {
                warn!("Failed to award chat completion: {}", err);
            }
            if notify_partner {
                self.registry.send_to(&partner, ServerEvent::PartnerLeft)?;
            }
            self.metrics.matches.chats_ended_total.inc();
            info!(
                "Chat ended by {} (partner: {})",
                crate::utils::short_id(&self.device_id),
                crate::utils::short_id(&partner)
            );
        }
        self.registry
            .send_to(&self.device_id, ServerEvent::ChatEnded)?;
        Ok(())
    }

    /// Withdraw from the queue.
    pub async fn leave_queue(&self) -> Result<()> {
        self.store.remove(&self.device_id, self.gender).await?;
        self.registry
            .send_to(&self.device_id, ServerEvent::LeftQueue)?;
        Ok(())
    }

    /// Tear down this connection's shared state. Idempotent, and a no-op
    /// when a newer connection for the same device has superseded this
    /// one.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.registry.remove_connection(&self.device_id, self.epoch)? {
            RemovalOutcome::Stale => Ok(()),
            RemovalOutcome::Removed { partner } => {
                if let Some(partner) = partner {
                    self.registry.send_to(&partner, ServerEvent::PartnerLeft)?;
                    self.metrics.matches.chats_ended_total.inc();
                }
                self.store.remove(&self.device_id, self.gender).await?;
                self.metrics
                    .connections
                    .active_connections
                    .set(self.registry.connection_count()? as i64);
                info!(
                    "Disconnected {}",
                    crate::utils::short_id(&self.device_id)
                );
                Ok(())
            }
        }
    }
}
