//! HTTP surface: the update webhook plus small operational endpoints.

use std::sync::Arc;

use {
    axum::{
        Json, Router,
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    },
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::warn,
};

use doorman_telegram::{App, BotApi, Update};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

pub struct Gateway {
    pub app: App,
    pub api: BotApi,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<Secret<String>>,
}

pub fn router(state: Arc<Gateway>) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/setup", get(setup))
        .route("/info", get(info))
        .route("/health", get(health))
        .with_state(state)
}

/// Telegram retries on non-200, so once the secret checks out this always
/// acknowledges; bad payloads are logged and dropped.
async fn webhook(
    State(state): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    if let Some(secret) = &state.webhook_secret {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(secret.expose_secret().as_str()) {
            return StatusCode::UNAUTHORIZED;
        }
    }
    match serde_json::from_str::<Update>(&body) {
        Ok(update) => state.app.handle_update(update).await,
        Err(e) => warn!(error = %e, "unparseable update payload"),
    }
    StatusCode::OK
}

/// Register the configured webhook URL with Telegram.
async fn setup(State(state): State<Arc<Gateway>>) -> (StatusCode, Json<Value>) {
    let Some(url) = &state.webhook_url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "webhook_url is not configured" })),
        );
    };
    let secret = state
        .webhook_secret
        .as_ref()
        .map(|s| s.expose_secret().as_str());
    match state.api.set_webhook(url, secret).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true, "url": url }))),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

/// Proxy Telegram's view of the webhook registration.
async fn info(State(state): State<Arc<Gateway>>) -> (StatusCode, Json<Value>) {
    match state.api.webhook_info().await {
        Ok(result) => (StatusCode::OK, Json(result)),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use {
        axum::{
            body::Body,
            http::{Request, header::CONTENT_TYPE},
        },
        doorman_storage::{MemoryStore, StateStore},
        tower::ServiceExt,
    };

    use super::*;

    // Unroutable address: these tests only exercise paths that never call
    // out to the Bot API.
    fn gateway(secret: Option<&str>) -> Arc<Gateway> {
        let api = BotApi::with_base("http://127.0.0.1:9");
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        Arc::new(Gateway {
            app: App::new(api.clone(), store, -100_500),
            api,
            webhook_url: None,
            webhook_secret: secret.map(|s| Secret::new(s.to_string())),
        })
    }

    fn webhook_request(secret: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post("/webhook").header(CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_TOKEN_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn health_answers() {
        let response = router(gateway(None))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_rejects_a_missing_or_wrong_secret() {
        let app = router(gateway(Some("s3cret")));
        let ignored = r#"{"update_id": 1}"#;

        let response = app
            .clone()
            .oneshot(webhook_request(None, ignored))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(webhook_request(Some("wrong"), ignored))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(webhook_request(Some("s3cret"), ignored))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_acknowledges_garbage_payloads() {
        let response = router(gateway(None))
            .oneshot(webhook_request(None, "not json at all"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_acknowledges_updates_it_ignores() {
        // A message in some unrelated group: dispatched, ignored, 200.
        let body = r#"{
            "update_id": 7,
            "message": {
                "message_id": 1,
                "chat": { "id": -200300 },
                "text": "hi"
            }
        }"#;
        let response = router(gateway(None))
            .oneshot(webhook_request(None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn setup_without_webhook_url_is_a_client_error() {
        let response = router(gateway(None))
            .oneshot(Request::get("/setup").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
