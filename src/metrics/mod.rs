//! Prometheus metrics for the chat matchmaking service

pub mod collector;

pub use collector::MetricsCollector;
