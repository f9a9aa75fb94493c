//! Connection and chat session state
//!
//! The registry holds every cross-connection map (live channels, active
//! pairings, cooldown stamps); the connection module drives one
//! participant's event flow against it.

pub mod connection;
pub mod registry;

pub use connection::{Admission, ChatSession};
pub use registry::{RemovalOutcome, SessionRegistry};
