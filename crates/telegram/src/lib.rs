//! Telegram Bot API integration: the raw-id HTTP client, webhook payload
//! model, the relay gateway implementation, and update handling.

pub mod api;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod markup;
pub mod update;

pub use {
    api::BotApi,
    error::{Error, Result},
    gateway::TelegramGateway,
    handlers::App,
    update::Update,
};
