//! Access gating, topic routing, and the bidirectional relay & mapping
//! engine.
//!
//! Everything here is platform-neutral: messaging I/O goes through the
//! [`gateway::MessagingGateway`] trait and persistence through the
//! repositories over `doorman_storage::StateStore`.

pub mod access;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod mapping;
pub mod records;
#[cfg(test)]
pub(crate) mod testutil;
pub mod topics;

pub use {
    access::{AccessGate, AccessStatus},
    engine::{EditContent, RelayEngine},
    error::{Error, Result},
    gateway::MessagingGateway,
    mapping::{MappingTable, Side},
    topics::TopicRouter,
};
