//! Error types for the chat matchmaking service
//!
//! This module defines all error types using anyhow for consistent error
//! handling throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Please wait {seconds} seconds between queue attempts")]
    CooldownActive { seconds: u64 },

    #[error("Daily limit for specific filters reached. Try 'Any' or wait until tomorrow.")]
    DailyFilterLimitReached,

    #[error("Participant not found: {device_id}")]
    ParticipantNotFound { device_id: String },

    #[error("Account store failure: {message}")]
    AccountStoreFailed { message: String },

    #[error("Queue backend failure: {message}")]
    QueueBackendFailed { message: String },

    #[error("Gender verification failed: {message}")]
    VerificationFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl ChatError {
    /// Lock-poisoning conversions all funnel through here.
    pub fn lock(what: &str) -> Self {
        ChatError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
