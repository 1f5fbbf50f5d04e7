//! Webhook update dispatch: verification flow, access decisions, and the
//! bridge into the relay engine.

use std::{sync::Arc, time::Duration};

use {
    doorman_common::{
        callbacks,
        keyboard::{Button, Keyboard},
        time,
        types::Profile,
    },
    doorman_relay::{
        AccessGate, AccessStatus, EditContent, RelayEngine, Side, TopicRouter,
        gateway::{Destination, MessagingGateway},
        records::{
            BlacklistEntry, BlacklistRepo, ChallengeRepo, CorrespondentRepo, MappingRepo, TopicRepo,
        },
    },
    doorman_storage::StateStore,
    doorman_verification::{Challenge, EXPIRY_REASON, Outcome},
    serde_json::json,
    tracing::{info, warn},
};

use crate::{
    api::BotApi,
    gateway::TelegramGateway,
    markup,
    update::{CallbackQuery, Message, Update, User},
};

const VERIFIED_GREETING: &str =
    "✅ You are verified. Messages you send here reach the operators directly.";

const BLACKLISTED_NOTICE: &str = "⛔ You are blacklisted and cannot contact the operators.";

const DELIVERY_FAILURE: &str = "⚠️ Delivery failed. Please send that message again.";

const STAFF_DELIVERY_FAILURE: &str =
    "⚠️ Could not deliver to the correspondent. They may have blocked the bot.";

const DEL_USAGE: &str = "Reply to a relayed message with /del to delete it on both sides.";

const UNBAN_NOTICE: &str = "♻️ Your blacklist entry was lifted. Send any message to verify again.";

const STALE_CHALLENGE: &str = "This challenge is gone. Send any message to get a fresh one.";

/// Everything one webhook worker needs, cheap to clone per request.
#[derive(Clone)]
pub struct App {
    api: BotApi,
    gateway: Arc<dyn MessagingGateway>,
    gate: AccessGate,
    challenges: ChallengeRepo,
    engine: RelayEngine,
    topics: TopicRouter,
    staff_chat: i64,
}

impl App {
    #[must_use]
    pub fn new(api: BotApi, store: Arc<dyn StateStore>, staff_chat: i64) -> Self {
        let gateway: Arc<dyn MessagingGateway> =
            Arc::new(TelegramGateway::new(api.clone(), staff_chat));
        let correspondents = CorrespondentRepo::new(Arc::clone(&store));
        let topics = TopicRouter::new(
            Arc::clone(&gateway),
            correspondents.clone(),
            TopicRepo::new(Arc::clone(&store)),
            staff_chat,
        );
        let engine = RelayEngine::new(
            Arc::clone(&gateway),
            MappingRepo::new(Arc::clone(&store)),
            topics.clone(),
        );
        let gate = AccessGate::new(correspondents, BlacklistRepo::new(Arc::clone(&store)));
        Self {
            api,
            gateway,
            gate,
            challenges: ChallengeRepo::new(store),
            engine,
            topics,
            staff_chat,
        }
    }

    /// Shorten the relay's reaction-marker delay; used by tests.
    #[must_use]
    pub fn with_marker_delay(mut self, delay: Duration) -> Self {
        self.engine = self.engine.clone().with_marker_delay(delay);
        self
    }

    /// Entry point for one webhook update. Never fails: the webhook must
    /// acknowledge regardless, so errors are logged and dropped here.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        if let Err(e) = self.dispatch(update).await {
            warn!(update_id, error = %e, "update handling failed");
        }
    }

    async fn dispatch(&self, update: Update) -> anyhow::Result<()> {
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }
        if let Some(msg) = update.edited_message {
            return self.handle_edit(msg).await;
        }
        if let Some(msg) = update.message {
            if msg.chat.id == self.staff_chat {
                return self.handle_staff_message(msg).await;
            }
            if msg.chat.id > 0 {
                return self.handle_private_message(msg).await;
            }
        }
        Ok(())
    }

    async fn handle_private_message(&self, msg: Message) -> anyhow::Result<()> {
        let Some(user) = msg.from.clone() else {
            return Ok(());
        };
        match self.gate.authorize(user.id).await? {
            AccessStatus::Blacklisted(_) => {
                self.notify(user.id, BLACKLISTED_NOTICE).await;
                Ok(())
            },
            AccessStatus::Unverified => self.begin_verification(&user).await,
            AccessStatus::Verified(_) => self.relay_from_correspondent(&user, msg).await,
        }
    }

    async fn relay_from_correspondent(&self, user: &User, msg: Message) -> anyhow::Result<()> {
        let text = msg.text.as_deref().map(str::trim).unwrap_or_default();
        if text == "/start" || text.starts_with("/start ") {
            self.notify(user.id, VERIFIED_GREETING).await;
            return Ok(());
        }
        if text == "/del" {
            let Some(target) = msg.reply_target() else {
                self.notify(user.id, DEL_USAGE).await;
                return Ok(());
            };
            self.engine
                .sync_delete(user.id, Side::Correspondent, target, Some(msg.message_id))
                .await?;
            return Ok(());
        }

        match self
            .engine
            .relay_inbound(user.id, msg.message_id, msg.reply_target())
            .await
        {
            Ok(_) => Ok(()),
            Err(doorman_relay::Error::MissingProfile(_)) => {
                // Degraded record; restart verification to recapture it.
                self.begin_verification(user).await
            },
            Err(e) => {
                warn!(correspondent = user.id, error = %e, "inbound relay failed");
                self.notify(user.id, DELIVERY_FAILURE).await;
                Ok(())
            },
        }
    }

    async fn handle_staff_message(&self, msg: Message) -> anyhow::Result<()> {
        // Messages outside any thread (the general topic) are staff chatter.
        let Some(thread_id) = msg.message_thread_id else {
            return Ok(());
        };

        let text = msg.text.as_deref().map(str::trim).unwrap_or_default();
        if text == "/del" {
            let Some(target) = msg.reply_target() else {
                self.notify_thread(thread_id, DEL_USAGE).await;
                return Ok(());
            };
            let Some(correspondent) = self.topics.resolve_correspondent(thread_id).await? else {
                return Ok(());
            };
            self.engine
                .sync_delete(correspondent, Side::Staff, target, Some(msg.message_id))
                .await?;
            return Ok(());
        }

        if let Err(e) = self
            .engine
            .relay_outbound(thread_id, msg.message_id, msg.reply_target())
            .await
        {
            warn!(thread_id, error = %e, "outbound relay failed");
            self.notify_thread(thread_id, STAFF_DELIVERY_FAILURE).await;
        }
        Ok(())
    }

    async fn handle_edit(&self, msg: Message) -> anyhow::Result<()> {
        let content = EditContent {
            text: msg.text.clone(),
            caption: msg.caption.clone(),
            media: msg.media_ref(),
        };

        if msg.chat.id == self.staff_chat {
            let Some(thread_id) = msg.message_thread_id else {
                return Ok(());
            };
            let Some(correspondent) = self.topics.resolve_correspondent(thread_id).await? else {
                return Ok(());
            };
            self.engine
                .sync_edit(correspondent, Side::Staff, msg.message_id, &content)
                .await?;
            return Ok(());
        }

        if msg.chat.id > 0 {
            // Only verified correspondents have mapped messages to edit.
            let AccessStatus::Verified(_) = self.gate.authorize(msg.chat.id).await? else {
                return Ok(());
            };
            self.engine
                .sync_edit(msg.chat.id, Side::Correspondent, msg.message_id, &content)
                .await?;
        }
        Ok(())
    }

    async fn begin_verification(&self, user: &User) -> anyhow::Result<()> {
        // Each new message restarts verification; the write below discards
        // any pending challenge.
        let challenge = Challenge::generate(time::now_ms());
        self.challenges.put(user.id, &challenge).await?;
        self.gateway
            .send_message(
                Destination::chat(user.id),
                &markup::challenge_prompt(&challenge),
                Some(&markup::challenge_keyboard(&challenge)),
            )
            .await?;
        info!(correspondent = user.id, kind = ?challenge.kind, "challenge issued");
        Ok(())
    }

    async fn handle_callback(&self, query: CallbackQuery) -> anyhow::Result<()> {
        let Some(data) = query.data.clone() else {
            return Ok(());
        };
        if let Some(token) = callbacks::parse_verify(&data) {
            return self.handle_verify_callback(&query, token).await;
        }
        if let Some(target) = callbacks::parse_block(&data) {
            return self.handle_block_callback(&query, target).await;
        }
        if let Some(target) = callbacks::parse_unban(&data) {
            return self.handle_unban_callback(&query, target).await;
        }
        self.api.answer_callback(&query.id, "", false).await?;
        Ok(())
    }

    async fn handle_verify_callback(
        &self,
        query: &CallbackQuery,
        token: &str,
    ) -> anyhow::Result<()> {
        let user = &query.from;
        let Some(mut challenge) = self.challenges.get(user.id).await? else {
            self.api.answer_callback(&query.id, STALE_CHALLENGE, true).await?;
            return Ok(());
        };

        match challenge.evaluate(token, time::now_ms()) {
            Outcome::Accepted => {
                self.challenges.delete(user.id).await?;
                self.gate.mark_verified(user.id, user.profile()).await?;
                if let Some(msg) = &query.message {
                    let _ = self
                        .gateway
                        .edit_text(
                            msg.chat.id,
                            msg.message_id,
                            "✅ <b>Verified.</b> Your messages now reach the operators.",
                        )
                        .await;
                }
                self.api.answer_callback(&query.id, "Verified!", false).await?;
            },
            Outcome::Progress => {
                self.challenges.put(user.id, &challenge).await?;
                if let Some(msg) = &query.message {
                    self.refresh_keyboard(msg, &challenge).await;
                }
                let toast = format!("Entered: {}", challenge.entered());
                self.api.answer_callback(&query.id, &toast, false).await?;
            },
            Outcome::Rejected { remaining } => {
                self.challenges.put(user.id, &challenge).await?;
                if let Some(msg) = &query.message {
                    self.refresh_keyboard(msg, &challenge).await;
                }
                let toast = format!("Wrong. {remaining} attempt(s) left.");
                self.api.answer_callback(&query.id, &toast, true).await?;
            },
            Outcome::Exhausted => {
                self.challenges.delete(user.id).await?;
                self.fail_verification(query, challenge.kind.failure_reason())
                    .await?;
            },
            Outcome::Expired => {
                self.challenges.delete(user.id).await?;
                self.fail_verification(query, EXPIRY_REASON).await?;
            },
        }
        Ok(())
    }

    async fn fail_verification(&self, query: &CallbackQuery, reason: &str) -> anyhow::Result<()> {
        let user = &query.from;
        let profile = user.profile();
        let entry = BlacklistEntry {
            reason: reason.to_string(),
            blacklisted_at: time::now_ms(),
            blocked_by: None,
            profile: Some(profile.clone()),
        };
        self.gate.blacklist(user.id, &entry).await?;
        if let Some(msg) = &query.message {
            let _ = self
                .gateway
                .edit_text(msg.chat.id, msg.message_id, "❌ <b>Verification failed.</b>")
                .await;
        }
        self.api.answer_callback(&query.id, reason, true).await?;
        self.audit_blacklist(user.id, Some(&profile), reason, None).await;
        Ok(())
    }

    async fn handle_block_callback(
        &self,
        query: &CallbackQuery,
        target: i64,
    ) -> anyhow::Result<()> {
        if !self.from_staff_chat(query) {
            self.api.answer_callback(&query.id, "Not allowed here.", true).await?;
            return Ok(());
        }
        let (profile, thread_id) = match self.gate.authorize(target).await? {
            AccessStatus::Verified(record) => (record.profile, record.thread_id),
            _ => (None, None),
        };
        let entry = BlacklistEntry {
            reason: "manually blacklisted".to_string(),
            blacklisted_at: time::now_ms(),
            blocked_by: Some(query.from.first_name.clone()),
            profile: profile.clone(),
        };
        self.gate.blacklist(target, &entry).await?;
        if let Some(thread_id) = thread_id {
            self.topics.unbind(thread_id).await?;
        }
        if let Some(msg) = &query.message {
            self.clear_markup(msg).await;
        }
        self.api.answer_callback(&query.id, "Blacklisted.", false).await?;
        self.audit_blacklist(
            target,
            profile.as_ref(),
            &entry.reason,
            entry.blocked_by.as_deref(),
        )
        .await;
        Ok(())
    }

    async fn handle_unban_callback(
        &self,
        query: &CallbackQuery,
        target: i64,
    ) -> anyhow::Result<()> {
        // Unban buttons only exist on audit-thread entries.
        if !self.from_staff_chat(query) || !self.from_audit_thread(query).await? {
            self.api.answer_callback(&query.id, "Not allowed here.", true).await?;
            return Ok(());
        }
        if self.gate.lift_blacklist(target).await? {
            if let Some(msg) = &query.message {
                self.clear_markup(msg).await;
            }
            self.api.answer_callback(&query.id, "Blacklist lifted.", false).await?;
            // Best effort: the correspondent may have blocked the bot.
            self.notify(target, UNBAN_NOTICE).await;
            self.audit_note(&format!(
                "♻️ <code>{target}</code> unblacklisted by {}.",
                query.from.first_name
            ))
            .await;
        } else {
            self.api
                .answer_callback(&query.id, "Not currently blacklisted.", false)
                .await?;
        }
        Ok(())
    }

    fn from_staff_chat(&self, query: &CallbackQuery) -> bool {
        query
            .message
            .as_ref()
            .is_some_and(|msg| msg.chat.id == self.staff_chat)
    }

    async fn from_audit_thread(&self, query: &CallbackQuery) -> anyhow::Result<bool> {
        let Some(thread_id) = query.message.as_ref().and_then(|msg| msg.message_thread_id) else {
            return Ok(false);
        };
        Ok(self.topics.is_audit_thread(thread_id).await?)
    }

    async fn refresh_keyboard(&self, msg: &Message, challenge: &Challenge) {
        let keyboard = markup::challenge_keyboard(challenge);
        let result = self
            .api
            .call("editMessageReplyMarkup", &json!({
                "chat_id": msg.chat.id,
                "message_id": msg.message_id,
                "reply_markup": markup::to_reply_markup(&keyboard),
            }))
            .await;
        if let Err(e) = result {
            warn!(message_id = msg.message_id, error = %e, "keyboard refresh failed");
        }
    }

    /// Drop the inline button from a pressed card/entry so it cannot be
    /// pressed twice.
    async fn clear_markup(&self, msg: &Message) {
        let result = self
            .api
            .call("editMessageReplyMarkup", &json!({
                "chat_id": msg.chat.id,
                "message_id": msg.message_id,
                "reply_markup": markup::to_reply_markup(&Keyboard::empty()),
            }))
            .await;
        if let Err(e) = result {
            warn!(message_id = msg.message_id, error = %e, "markup clear failed");
        }
    }

    async fn audit_blacklist(
        &self,
        correspondent: i64,
        profile: Option<&Profile>,
        reason: &str,
        blocked_by: Option<&str>,
    ) {
        let name = profile.map_or("unknown", |p| p.display_name.as_str());
        let mut text = format!(
            "🚫 <b>{name}</b> (<code>{correspondent}</code>) blacklisted.\nReason: {reason}"
        );
        if let Some(by) = blocked_by {
            text.push_str(&format!("\nBy: {by}"));
        }
        let keyboard = Keyboard::single(Button::new(
            "♻️ Lift blacklist",
            callbacks::unban(correspondent),
        ));
        match self.topics.ensure_audit_thread().await {
            Ok(thread_id) => {
                if let Err(e) = self
                    .gateway
                    .send_message(
                        Destination::thread(self.staff_chat, thread_id),
                        &text,
                        Some(&keyboard),
                    )
                    .await
                {
                    warn!(correspondent, error = %e, "audit entry not delivered");
                }
            },
            Err(e) => warn!(correspondent, error = %e, "audit thread unavailable"),
        }
    }

    async fn audit_note(&self, text: &str) {
        match self.topics.ensure_audit_thread().await {
            Ok(thread_id) => {
                if let Err(e) = self
                    .gateway
                    .send_message(Destination::thread(self.staff_chat, thread_id), text, None)
                    .await
                {
                    warn!(error = %e, "audit note not delivered");
                }
            },
            Err(e) => warn!(error = %e, "audit thread unavailable"),
        }
    }

    async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(e) = self
            .gateway
            .send_message(Destination::chat(chat_id), text, None)
            .await
        {
            warn!(chat_id, error = %e, "notice not delivered");
        }
    }

    async fn notify_thread(&self, thread_id: i64, text: &str) {
        if let Err(e) = self
            .gateway
            .send_message(Destination::thread(self.staff_chat, thread_id), text, None)
            .await
        {
            warn!(thread_id, error = %e, "notice not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicI64, Ordering},
    };

    use {
        axum::{Json, Router, extract::State, http::Uri, routing::post},
        doorman_relay::records::CorrespondentRecord,
        doorman_storage::MemoryStore,
        doorman_verification::{ChallengeKind, MAX_CHANCES},
        serde_json::Value,
    };

    use super::*;

    #[derive(Clone)]
    struct MockApi {
        requests: Arc<Mutex<Vec<(String, Value)>>>,
        next_message_id: Arc<AtomicI64>,
        next_thread_id: Arc<AtomicI64>,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                next_message_id: Arc::new(AtomicI64::new(900)),
                next_thread_id: Arc::new(AtomicI64::new(70)),
            }
        }

        fn requests(&self) -> Vec<(String, Value)> {
            self.requests.lock().unwrap().clone()
        }

        fn calls_to(&self, method: &str) -> Vec<Value> {
            self.requests()
                .into_iter()
                .filter(|(m, _)| m == method)
                .map(|(_, body)| body)
                .collect()
        }
    }

    async fn mock_handler(
        State(state): State<MockApi>,
        uri: Uri,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
        let result = match method.as_str() {
            "sendMessage" | "copyMessage" => {
                json!({ "message_id": state.next_message_id.fetch_add(1, Ordering::SeqCst) })
            },
            "createForumTopic" => {
                json!({ "message_thread_id": state.next_thread_id.fetch_add(1, Ordering::SeqCst) })
            },
            _ => json!(true),
        };
        state.requests.lock().unwrap().push((method, body));
        Json(json!({ "ok": true, "result": result }))
    }

    const STAFF: i64 = -100_500;
    const USER: i64 = 1001;

    struct Harness {
        mock: MockApi,
        store: Arc<dyn StateStore>,
        app: App,
    }

    async fn harness() -> Harness {
        let mock = MockApi::new();
        let router = Router::new()
            .route("/{*path}", post(mock_handler))
            .with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let api = BotApi::with_base(format!("http://{addr}"));
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let app = App::new(api, Arc::clone(&store), STAFF).with_marker_delay(Duration::ZERO);
        Harness { mock, store, app }
    }

    fn text_update(chat_id: i64, message_id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": message_id,
                "from": {
                    "id": chat_id,
                    "first_name": "Alice",
                    "username": "alice",
                    "language_code": "en"
                },
                "chat": { "id": chat_id },
                "text": text
            }
        }))
        .unwrap()
    }

    fn staff_update(thread_id: i64, message_id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 2,
            "message": {
                "message_id": message_id,
                "from": { "id": 777, "first_name": "Op" },
                "chat": { "id": STAFF },
                "message_thread_id": thread_id,
                "text": text
            }
        }))
        .unwrap()
    }

    fn callback_update(user_id: i64, data: &str, chat_id: i64) -> Update {
        serde_json::from_value(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb1",
                "from": { "id": user_id, "first_name": "Alice", "language_code": "en" },
                "data": data,
                "message": {
                    "message_id": 600,
                    "chat": { "id": chat_id }
                }
            }
        }))
        .unwrap()
    }

    fn thread_callback_update(user_id: i64, data: &str, thread_id: i64) -> Update {
        serde_json::from_value(json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb2",
                "from": { "id": user_id, "first_name": "Op" },
                "data": data,
                "message": {
                    "message_id": 601,
                    "chat": { "id": STAFF },
                    "message_thread_id": thread_id
                }
            }
        }))
        .unwrap()
    }

    fn arithmetic_challenge(remaining: u32) -> Challenge {
        Challenge {
            kind: ChallengeKind::Arithmetic,
            question: "6 × 7 = ?".into(),
            answer: "42".into(),
            options: vec!["42".into(), "40".into(), "44".into(), "39".into()],
            attempts: Vec::new(),
            remaining_chances: remaining,
            created_at: time::now_ms(),
            expires_at: time::now_ms() + 180_000,
        }
    }

    async fn seed_verified(store: &Arc<dyn StateStore>) {
        CorrespondentRepo::new(Arc::clone(store))
            .put(USER, &CorrespondentRecord {
                verified: true,
                verified_at: 1,
                thread_id: None,
                profile: Some(Profile::new("Alice")),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unverified_message_gets_a_challenge_with_keyboard() {
        let h = harness().await;
        h.app.handle_update(text_update(USER, 501, "hello")).await;

        let sends = h.mock.calls_to("sendMessage");
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0]["chat_id"], USER);
        assert!(sends[0]["text"].as_str().unwrap().contains("Verification required"));
        assert!(sends[0]["reply_markup"]["inline_keyboard"][0][0]["callback_data"]
            .as_str()
            .unwrap()
            .starts_with("verify_"));

        let stored = ChallengeRepo::new(Arc::clone(&h.store)).get(USER).await.unwrap();
        assert!(stored.is_some());

        // The original message was not relayed anywhere.
        assert!(h.mock.calls_to("copyMessage").is_empty());
    }

    #[tokio::test]
    async fn new_message_discards_the_pending_challenge() {
        let h = harness().await;
        let repo = ChallengeRepo::new(Arc::clone(&h.store));
        let mut worn = arithmetic_challenge(1);
        worn.attempts = vec!["40".into(), "44".into()];
        repo.put(USER, &worn).await.unwrap();

        h.app.handle_update(text_update(USER, 501, "hello?")).await;

        // A fresh challenge replaced the worn one.
        let stored = repo.get(USER).await.unwrap().unwrap();
        assert!(stored.attempts.is_empty());
        assert_eq!(stored.remaining_chances, MAX_CHANCES);

        let sends = h.mock.calls_to("sendMessage");
        assert_eq!(sends.len(), 1);
        assert!(sends[0]["text"].as_str().unwrap().contains("Verification required"));
    }

    #[tokio::test]
    async fn correct_answer_verifies_and_consumes_the_challenge() {
        let h = harness().await;
        ChallengeRepo::new(Arc::clone(&h.store))
            .put(USER, &arithmetic_challenge(3))
            .await
            .unwrap();

        h.app.handle_update(callback_update(USER, "verify_42", USER)).await;

        let gate = AccessGate::new(
            CorrespondentRepo::new(Arc::clone(&h.store)),
            BlacklistRepo::new(Arc::clone(&h.store)),
        );
        assert!(matches!(
            gate.authorize(USER).await.unwrap(),
            AccessStatus::Verified(_)
        ));
        assert!(ChallengeRepo::new(Arc::clone(&h.store))
            .get(USER)
            .await
            .unwrap()
            .is_none());

        let answers = h.mock.calls_to("answerCallbackQuery");
        assert_eq!(answers.last().unwrap()["text"], "Verified!");
        // The prompt was rewritten in place.
        assert!(!h.mock.calls_to("editMessageText").is_empty());
    }

    #[tokio::test]
    async fn wrong_answer_decrements_and_keeps_the_challenge() {
        let h = harness().await;
        ChallengeRepo::new(Arc::clone(&h.store))
            .put(USER, &arithmetic_challenge(3))
            .await
            .unwrap();

        h.app.handle_update(callback_update(USER, "verify_40", USER)).await;

        let stored = ChallengeRepo::new(Arc::clone(&h.store))
            .get(USER)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.remaining_chances, 2);
        let answers = h.mock.calls_to("answerCallbackQuery");
        assert!(answers.last().unwrap()["text"].as_str().unwrap().contains("2 attempt"));
    }

    #[tokio::test]
    async fn exhausted_chances_blacklist_and_log_to_audit_thread() {
        let h = harness().await;
        ChallengeRepo::new(Arc::clone(&h.store))
            .put(USER, &arithmetic_challenge(1))
            .await
            .unwrap();

        h.app.handle_update(callback_update(USER, "verify_40", USER)).await;

        let gate = AccessGate::new(
            CorrespondentRepo::new(Arc::clone(&h.store)),
            BlacklistRepo::new(Arc::clone(&h.store)),
        );
        assert!(matches!(
            gate.authorize(USER).await.unwrap(),
            AccessStatus::Blacklisted(_)
        ));

        // Audit thread created and the entry carries a lift button.
        let topics = h.mock.calls_to("createForumTopic");
        assert_eq!(topics[0]["name"], "Logs");
        let audit_entry = h
            .mock
            .calls_to("sendMessage")
            .into_iter()
            .find(|body| {
                body["reply_markup"]["inline_keyboard"][0][0]["callback_data"]
                    == json!(format!("unban_{USER}"))
            });
        assert!(audit_entry.is_some());
    }

    #[tokio::test]
    async fn stale_callback_answers_without_side_effects() {
        let h = harness().await;
        h.app.handle_update(callback_update(USER, "verify_42", USER)).await;
        let answers = h.mock.calls_to("answerCallbackQuery");
        assert!(answers[0]["text"].as_str().unwrap().contains("gone"));
        assert!(h.mock.calls_to("editMessageText").is_empty());
    }

    #[tokio::test]
    async fn verified_message_is_copied_into_a_fresh_thread() {
        let h = harness().await;
        seed_verified(&h.store).await;

        h.app.handle_update(text_update(USER, 501, "hello operators")).await;

        let topics = h.mock.calls_to("createForumTopic");
        assert_eq!(topics[0]["name"], "Alice");
        let copies = h.mock.calls_to("copyMessage");
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0]["from_chat_id"], USER);
        assert_eq!(copies[0]["chat_id"], STAFF);
        assert_eq!(copies[0]["message_id"], 501);

        // Ack reaction applied then cleared.
        let reactions = h.mock.calls_to("setMessageReaction");
        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[0]["reaction"][0]["emoji"], "👍");
        assert_eq!(reactions[1]["reaction"], json!([]));
    }

    #[tokio::test]
    async fn staff_reply_is_copied_back_to_the_correspondent() {
        let h = harness().await;
        seed_verified(&h.store).await;
        h.app.handle_update(text_update(USER, 501, "hello")).await;

        let thread_id = h.mock.calls_to("copyMessage")[0]["message_thread_id"]
            .as_i64()
            .unwrap();
        h.app.handle_update(staff_update(thread_id, 955, "hi Alice")).await;

        let copies = h.mock.calls_to("copyMessage");
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[1]["from_chat_id"], STAFF);
        assert_eq!(copies[1]["chat_id"], USER);
        assert_eq!(copies[1]["message_id"], 955);
    }

    #[tokio::test]
    async fn blacklisted_correspondent_is_refused() {
        let h = harness().await;
        let gate = AccessGate::new(
            CorrespondentRepo::new(Arc::clone(&h.store)),
            BlacklistRepo::new(Arc::clone(&h.store)),
        );
        gate.blacklist(USER, &BlacklistEntry {
            reason: "manual".into(),
            blacklisted_at: 1,
            blocked_by: None,
            profile: None,
        })
        .await
        .unwrap();

        h.app.handle_update(text_update(USER, 501, "let me in")).await;

        let sends = h.mock.calls_to("sendMessage");
        assert_eq!(sends.len(), 1);
        assert!(sends[0]["text"].as_str().unwrap().contains("blacklisted"));
        assert!(h.mock.calls_to("copyMessage").is_empty());
    }

    #[tokio::test]
    async fn block_callback_outside_staff_chat_is_refused() {
        let h = harness().await;
        seed_verified(&h.store).await;

        h.app
            .handle_update(callback_update(USER, &format!("block_{USER}"), USER))
            .await;

        let gate = AccessGate::new(
            CorrespondentRepo::new(Arc::clone(&h.store)),
            BlacklistRepo::new(Arc::clone(&h.store)),
        );
        assert!(matches!(
            gate.authorize(USER).await.unwrap(),
            AccessStatus::Verified(_)
        ));
        let answers = h.mock.calls_to("answerCallbackQuery");
        assert!(answers[0]["text"].as_str().unwrap().contains("Not allowed"));
    }

    #[tokio::test]
    async fn block_and_unban_round_trip_from_the_staff_chat() {
        let h = harness().await;
        seed_verified(&h.store).await;

        h.app
            .handle_update(callback_update(777, &format!("block_{USER}"), STAFF))
            .await;
        let gate = AccessGate::new(
            CorrespondentRepo::new(Arc::clone(&h.store)),
            BlacklistRepo::new(Arc::clone(&h.store)),
        );
        assert!(matches!(
            gate.authorize(USER).await.unwrap(),
            AccessStatus::Blacklisted(_)
        ));

        // The block was logged to the audit thread; press unban there.
        let audit = TopicRepo::new(Arc::clone(&h.store))
            .audit_thread()
            .await
            .unwrap()
            .unwrap();
        h.app
            .handle_update(thread_callback_update(777, &format!("unban_{USER}"), audit))
            .await;
        assert!(matches!(
            gate.authorize(USER).await.unwrap(),
            AccessStatus::Unverified
        ));
        // The correspondent was told they can verify again.
        let notices = h.mock.calls_to("sendMessage");
        assert!(notices
            .iter()
            .any(|b| b["chat_id"] == USER && b["text"].as_str().unwrap().contains("lifted")));
    }

    #[tokio::test]
    async fn unban_callback_outside_the_audit_thread_is_refused() {
        let h = harness().await;
        seed_verified(&h.store).await;
        h.app
            .handle_update(callback_update(777, &format!("block_{USER}"), STAFF))
            .await;

        // Pressed in an ordinary staff thread, not the audit log.
        h.app
            .handle_update(thread_callback_update(777, &format!("unban_{USER}"), 7))
            .await;

        let gate = AccessGate::new(
            CorrespondentRepo::new(Arc::clone(&h.store)),
            BlacklistRepo::new(Arc::clone(&h.store)),
        );
        assert!(matches!(
            gate.authorize(USER).await.unwrap(),
            AccessStatus::Blacklisted(_)
        ));
        let answers = h.mock.calls_to("answerCallbackQuery");
        assert!(answers.last().unwrap()["text"].as_str().unwrap().contains("Not allowed"));
    }

    #[tokio::test]
    async fn start_lookalike_command_is_relayed_not_greeted() {
        let h = harness().await;
        seed_verified(&h.store).await;

        h.app.handle_update(text_update(USER, 501, "/startle")).await;

        assert_eq!(h.mock.calls_to("copyMessage").len(), 1);
        // No greeting went back to the correspondent.
        let sends = h.mock.calls_to("sendMessage");
        assert!(!sends.iter().any(|b| b["chat_id"] == USER));
    }

    #[tokio::test]
    async fn del_reply_deletes_on_both_sides() {
        let h = harness().await;
        seed_verified(&h.store).await;
        h.app.handle_update(text_update(USER, 501, "oops")).await;
        let copy_id = h.mock.calls_to("copyMessage")[0]["message_id"].as_i64();
        assert_eq!(copy_id, Some(501));

        let update: Update = serde_json::from_value(json!({
            "update_id": 4,
            "message": {
                "message_id": 502,
                "from": { "id": USER, "first_name": "Alice" },
                "chat": { "id": USER },
                "text": "/del",
                "reply_to_message": {
                    "message_id": 501,
                    "chat": { "id": USER }
                }
            }
        }))
        .unwrap();
        h.app.handle_update(update).await;

        let deletes = h.mock.calls_to("deleteMessage");
        // Original, relayed copy, and the /del command itself.
        assert_eq!(deletes.len(), 3);
        assert!(deletes.iter().any(|b| b["chat_id"] == USER && b["message_id"] == 501));
        assert!(deletes.iter().any(|b| b["chat_id"] == STAFF));
        assert!(deletes.iter().any(|b| b["chat_id"] == USER && b["message_id"] == 502));
    }

    #[tokio::test]
    async fn edited_message_is_replayed_with_markers() {
        let h = harness().await;
        seed_verified(&h.store).await;
        h.app.handle_update(text_update(USER, 501, "helo")).await;

        let update: Update = serde_json::from_value(json!({
            "update_id": 5,
            "edited_message": {
                "message_id": 501,
                "from": { "id": USER, "first_name": "Alice" },
                "chat": { "id": USER },
                "text": "hello"
            }
        }))
        .unwrap();
        h.app.handle_update(update).await;

        let edits = h.mock.calls_to("editMessageText");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0]["chat_id"], STAFF);
        assert_eq!(edits[0]["text"], "hello");
        let edit_marks: Vec<_> = h
            .mock
            .calls_to("setMessageReaction")
            .into_iter()
            .filter(|b| b["reaction"][0]["emoji"] == "✍")
            .collect();
        assert_eq!(edit_marks.len(), 2);
    }

    #[tokio::test]
    async fn general_topic_staff_chatter_is_ignored() {
        let h = harness().await;
        let update: Update = serde_json::from_value(json!({
            "update_id": 6,
            "message": {
                "message_id": 1,
                "from": { "id": 777, "first_name": "Op" },
                "chat": { "id": STAFF },
                "text": "internal note"
            }
        }))
        .unwrap();
        h.app.handle_update(update).await;
        assert!(h.mock.requests().is_empty());
    }
}
