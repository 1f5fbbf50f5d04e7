//! Thin Bot API client: one JSON POST per method call.
//!
//! Higher layers speak raw chat/message/thread ids, so there is no typed
//! request model here, just `call` plus a few conveniences for responses
//! whose shape we rely on.

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::debug,
};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct BotApi {
    http: reqwest::Client,
    base: String,
}

impl BotApi {
    #[must_use]
    pub fn new(token: &Secret<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("https://api.telegram.org/bot{}", token.expose_secret()),
        }
    }

    /// Point the client at a different server; used by tests.
    #[must_use]
    pub fn with_base(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    /// POST one Bot API method and unwrap the `{ok, result}` envelope.
    pub async fn call(&self, method: &str, params: &Value) -> Result<Value> {
        debug!(method, "bot api call");
        let response: ApiResponse = self
            .http
            .post(format!("{}/{method}", self.base))
            .json(params)
            .send()
            .await?
            .json()
            .await?;
        if response.ok {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            Err(Error::api(
                method,
                response.description.unwrap_or_else(|| "no description".into()),
            ))
        }
    }

    /// Call a method whose result is a message and return its id.
    pub async fn call_for_message_id(&self, method: &str, params: &Value) -> Result<i64> {
        let result = self.call(method, params).await?;
        result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Payload {
                method: method.to_string(),
            })
    }

    pub async fn answer_callback(&self, query_id: &str, text: &str, alert: bool) -> Result<()> {
        self.call("answerCallbackQuery", &json!({
            "callback_query_id": query_id,
            "text": text,
            "show_alert": alert,
        }))
        .await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let mut params = json!({
            "url": url,
            "drop_pending_updates": true,
            "allowed_updates": ["message", "edited_message", "callback_query"],
        });
        if let Some(secret) = secret_token {
            params["secret_token"] = Value::String(secret.to_string());
        }
        self.call("setWebhook", &params).await?;
        Ok(())
    }

    pub async fn webhook_info(&self) -> Result<Value> {
        self.call("getWebhookInfo", &json!({})).await
    }
}
