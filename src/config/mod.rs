//! Configuration management for the chat matchmaking service
//!
//! This module provides configuration structures and validation for all
//! aspects of the service.

pub mod app;
pub mod policy;

pub use app::{validate_config, AppConfig, QueueBackendKind, ServerSettings, ServiceSettings};
pub use policy::{ClassifierFallback, PolicySettings};
