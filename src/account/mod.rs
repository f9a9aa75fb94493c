//! Participant account access
//!
//! Accounts are owned by an external system; this service only reads
//! profiles and pushes karma and counter updates through a narrow trait.

pub mod store;

pub use store::{AccountStore, MemoryAccountStore};

#[cfg(test)]
pub use store::MockAccountStore;
