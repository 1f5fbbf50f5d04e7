//! Service wiring: configuration and the HTTP gateway around the bot.

pub mod config;
pub mod error;
pub mod server;

pub use {config::AppConfig, server::Gateway};
