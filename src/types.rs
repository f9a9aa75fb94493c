//! Common types used throughout the chat matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, device-scoped identifier for one chat participant.
///
/// Stable across reconnects; used as the key into every shared structure.
pub type DeviceId = String;

/// Concrete gender values as used by the queue buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Normalize an external gender label to the queue vocabulary.
    ///
    /// The classifier emits "Man"/"Woman" while the queues speak
    /// "male"/"female"; this is the single bridging function every entry
    /// point must use. Unknown labels return `None` and land in the
    /// catch-all queue bucket.
    pub fn from_label(label: &str) -> Option<Gender> {
        match label.trim().to_lowercase().as_str() {
            "male" | "man" => Some(Gender::Male),
            "female" | "woman" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant's stated match preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    Male,
    Female,
    Any,
}

impl Default for Preference {
    fn default() -> Self {
        Preference::Any
    }
}

impl Preference {
    /// Whether a candidate with the given gender satisfies this preference.
    ///
    /// A candidate with no concrete gender only satisfies `Any`.
    pub fn accepts(&self, gender: Option<Gender>) -> bool {
        match (self, gender) {
            (Preference::Any, _) => true,
            (Preference::Male, Some(Gender::Male)) => true,
            (Preference::Female, Some(Gender::Female)) => true,
            _ => false,
        }
    }

    /// True for concrete-gender preferences, which are subject to the
    /// daily filter ceiling.
    pub fn is_specific(&self) -> bool {
        !matches!(self, Preference::Any)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preference::Male => "male",
            Preference::Female => "female",
            Preference::Any => "any",
        }
    }
}

impl From<Gender> for Preference {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => Preference::Male,
            Gender::Female => Preference::Female,
        }
    }
}

impl std::fmt::Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue bucket a pending request lives in, keyed by the requester's
/// own gender. `Other` is the catch-all for labels that normalize to
/// neither concrete value; its occupants are only reachable through
/// "any" searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBucket {
    Male,
    Female,
    Other,
}

impl QueueBucket {
    pub fn for_gender(gender: Option<Gender>) -> QueueBucket {
        match gender {
            Some(Gender::Male) => QueueBucket::Male,
            Some(Gender::Female) => QueueBucket::Female,
            None => QueueBucket::Other,
        }
    }

    pub fn all() -> [QueueBucket; 3] {
        [QueueBucket::Male, QueueBucket::Female, QueueBucket::Other]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueBucket::Male => "male",
            QueueBucket::Female => "female",
            QueueBucket::Other => "other",
        }
    }
}

impl std::fmt::Display for QueueBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which buckets a match search walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSelector {
    /// A single concrete bucket.
    Bucket(QueueBucket),
    /// The union of all buckets, oldest entries first within each bucket.
    Any,
}

impl From<Preference> for BucketSelector {
    fn from(preference: Preference) -> Self {
        match preference {
            Preference::Male => BucketSelector::Bucket(QueueBucket::Male),
            Preference::Female => BucketSelector::Bucket(QueueBucket::Female),
            Preference::Any => BucketSelector::Any,
        }
    }
}

/// A pending match request sitting in a queue bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub device_id: DeviceId,
    /// Normalized own gender; `None` means the label did not normalize
    /// and the entry lives in the catch-all bucket.
    pub gender: Option<Gender>,
    pub looking_for: Preference,
    pub joined_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(device_id: DeviceId, gender: Option<Gender>, looking_for: Preference) -> Self {
        Self {
            device_id,
            gender,
            looking_for,
            joined_at: crate::utils::current_timestamp(),
        }
    }

    pub fn bucket(&self) -> QueueBucket {
        QueueBucket::for_gender(self.gender)
    }
}

/// Externally-owned access tier derived from karma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Full,
    Standard,
    Warning,
    TempBan,
    PermanentBan,
}

impl AccessLevel {
    pub fn is_banned(&self) -> bool {
        matches!(self, AccessLevel::TempBan | AccessLevel::PermanentBan)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Full => "full",
            AccessLevel::Standard => "standard",
            AccessLevel::Warning => "warning",
            AccessLevel::TempBan => "temp_ban",
            AccessLevel::PermanentBan => "permanent_ban",
        }
    }
}

/// Snapshot of an account as read from the external account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub device_id: DeviceId,
    /// Raw gender label as produced by verification; absent while
    /// verification is incomplete.
    pub gender_label: Option<String>,
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub karma: i64,
    pub daily_specific_filter_count: u32,
    pub daily_matches_count: u32,
}

impl AccountRecord {
    /// Normalized own gender, if verification produced a usable label.
    pub fn gender(&self) -> Option<Gender> {
        self.gender_label.as_deref().and_then(Gender::from_label)
    }

    pub fn verified(&self) -> bool {
        self.gender_label.as_deref().is_some_and(|l| !l.is_empty())
    }
}

/// Partner details disclosed on match. Never carries gender, device id,
/// or anything else identifying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub nickname: String,
    pub bio: String,
}

impl PartnerProfile {
    pub fn from_account(account: &AccountRecord) -> Self {
        Self {
            nickname: account
                .nickname
                .clone()
                .unwrap_or_else(|| "Anonymous".to_string()),
            bio: account.bio.clone().unwrap_or_default(),
        }
    }
}

/// Inbound channel events (participant -> core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinQueue {
        #[serde(default)]
        looking_for: Preference,
    },
    LeaveQueue,
    SendMessage {
        content: String,
    },
    LeaveChat,
    NextMatch {
        #[serde(default)]
        looking_for: Preference,
    },
}

/// Outbound channel events (core -> participant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        karma: i64,
        nickname: String,
    },
    Queued {
        looking_for: Preference,
    },
    LeftQueue,
    MatchFound {
        partner: PartnerProfile,
    },
    Message {
        from: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
    PartnerLeft,
    ChatEnded,
    Error {
        message: String,
    },
}

/// Reasons a channel-open handshake is rejected, each with a distinct
/// close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownParticipant,
    VerificationIncomplete,
    AccessDenied(AccessLevel),
}

impl RejectReason {
    pub fn close_code(&self) -> u16 {
        match self {
            RejectReason::UnknownParticipant => 4001,
            RejectReason::VerificationIncomplete => 4002,
            RejectReason::AccessDenied(_) => 4003,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            RejectReason::UnknownParticipant => "User not found".to_string(),
            RejectReason::VerificationIncomplete => "Gender verification required".to_string(),
            RejectReason::AccessDenied(level) => format!("Access denied: {}", level.as_str()),
        }
    }
}
