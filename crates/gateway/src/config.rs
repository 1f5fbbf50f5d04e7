//! Service configuration: TOML file with environment overrides.
//!
//! Every field has a `DOORMAN_*` environment variable, so a bare container
//! deployment needs no file at all.

use std::{env, path::Path};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
};

use crate::error::{Context, Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Bot API token; redacted in Debug output.
    pub bot_token: Secret<String>,
    /// The forum-enabled staff supergroup the bot relays into.
    pub staff_chat: i64,
    pub bind: String,
    pub port: u16,
    pub db_path: String,
    /// Public URL Telegram should deliver updates to.
    pub webhook_url: Option<String>,
    /// When set, updates must carry this value in
    /// `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: Option<Secret<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: Secret::new(String::new()),
            staff_chat: 0,
            bind: "127.0.0.1".to_string(),
            port: 8787,
            db_path: "doorman.db".to_string(),
            webhook_url: None,
            webhook_secret: None,
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
            },
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("DOORMAN_BOT_TOKEN") {
            self.bot_token = Secret::new(value);
        }
        if let Ok(value) = env::var("DOORMAN_STAFF_CHAT")
            && let Ok(id) = value.parse()
        {
            self.staff_chat = id;
        }
        if let Ok(value) = env::var("DOORMAN_BIND") {
            self.bind = value;
        }
        if let Ok(value) = env::var("DOORMAN_PORT")
            && let Ok(port) = value.parse()
        {
            self.port = port;
        }
        if let Ok(value) = env::var("DOORMAN_DB_PATH") {
            self.db_path = value;
        }
        if let Ok(value) = env::var("DOORMAN_WEBHOOK_URL") {
            self.webhook_url = Some(value);
        }
        if let Ok(value) = env::var("DOORMAN_WEBHOOK_SECRET") {
            self.webhook_secret = Some(Secret::new(value));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.expose_secret().is_empty() {
            return Err(Error::message(
                "bot_token is not set (config file or DOORMAN_BOT_TOKEN)",
            ));
        }
        if self.staff_chat >= 0 {
            return Err(Error::message(
                "staff_chat must be the (negative) id of the staff supergroup",
            ));
        }
        Ok(())
    }
}
