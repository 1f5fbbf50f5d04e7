//! Human-verification challenges for unknown correspondents.
//!
//! A challenge is generated when an unverified correspondent first writes
//! in, and evaluated one submitted option at a time. The state machine is
//! pure: all storage and messaging reactions to an [`Outcome`] live in the
//! handler layer.

pub mod challenge;

pub use challenge::{
    CHALLENGE_EXPIRY_MS, Challenge, ChallengeKind, EXPIRY_REASON, MAX_CHANCES, Outcome,
};
