//! Shared types, error definitions, and utilities used across all doorman crates.

pub mod callbacks;
pub mod error;
pub mod keyboard;
pub mod time;
pub mod types;

pub use error::{Error, FromMessage, Result};
