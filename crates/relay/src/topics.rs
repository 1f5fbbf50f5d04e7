//! Thread-per-correspondent routing and the audit-thread singleton.

use std::sync::Arc;

use {
    doorman_common::{callbacks, keyboard::{Button, Keyboard}, types::Profile},
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    gateway::{Destination, MessagingGateway},
    records::{CorrespondentRepo, TopicRepo},
};

const AUDIT_THREAD_TITLE: &str = "Logs";

const AUDIT_THREAD_INTRO: &str = "📋 <b>Verification log</b>\n\n\
    Failed and manually blacklisted correspondents are recorded here.\n\
    Use the button on an entry to lift a blacklist.";

#[derive(Clone)]
pub struct TopicRouter {
    gateway: Arc<dyn MessagingGateway>,
    correspondents: CorrespondentRepo,
    topics: TopicRepo,
    staff_chat: i64,
}

impl TopicRouter {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        correspondents: CorrespondentRepo,
        topics: TopicRepo,
        staff_chat: i64,
    ) -> Self {
        Self {
            gateway,
            correspondents,
            topics,
            staff_chat,
        }
    }

    #[must_use]
    pub fn staff_chat(&self) -> i64 {
        self.staff_chat
    }

    /// Return the correspondent's thread id, creating the thread on first
    /// use.
    ///
    /// Thread creation failure leaves the record without a thread id so the
    /// next inbound message retries. Two racing first messages can create
    /// two threads; the later record write wins and one thread is orphaned,
    /// which is accepted (the store has no compare-and-swap).
    pub async fn ensure_thread(&self, correspondent: i64) -> Result<i64> {
        let mut record = self
            .correspondents
            .get(correspondent)
            .await?
            .ok_or(Error::MissingProfile(correspondent))?;

        if let Some(thread_id) = record.thread_id {
            return Ok(thread_id);
        }

        let profile = record
            .profile
            .clone()
            .ok_or(Error::MissingProfile(correspondent))?;

        let thread_id = self.gateway.create_thread(&profile.display_name).await?;
        record.thread_id = Some(thread_id);
        self.correspondents.put(correspondent, &record).await?;
        self.topics.bind(thread_id, correspondent).await?;
        info!(correspondent, thread_id, "created correspondent thread");

        // The thread is usable even if the card cannot be posted or pinned.
        if let Err(e) = self.post_profile_card(correspondent, thread_id, &profile).await {
            warn!(correspondent, thread_id, error = %e, "failed to post profile card");
        }

        Ok(thread_id)
    }

    async fn post_profile_card(
        &self,
        correspondent: i64,
        thread_id: i64,
        profile: &Profile,
    ) -> Result<()> {
        let card = profile_card(correspondent, profile);
        let keyboard = Keyboard::single(Button::new(
            "🚫 Blacklist",
            callbacks::block(correspondent),
        ));
        let card_id = self
            .gateway
            .send_message(
                Destination::thread(self.staff_chat, thread_id),
                &card,
                Some(&keyboard),
            )
            .await?;
        self.gateway.pin_message(self.staff_chat, card_id).await?;
        Ok(())
    }

    /// Resolve a staff thread back to its correspondent, if bound.
    pub async fn resolve_correspondent(&self, thread_id: i64) -> Result<Option<i64>> {
        self.topics.resolve(thread_id).await
    }

    pub async fn unbind(&self, thread_id: i64) -> Result<()> {
        self.topics.unbind(thread_id).await
    }

    /// Return the audit thread id, creating and persisting it on first use.
    pub async fn ensure_audit_thread(&self) -> Result<i64> {
        if let Some(thread_id) = self.topics.audit_thread().await? {
            return Ok(thread_id);
        }
        let thread_id = self.gateway.create_thread(AUDIT_THREAD_TITLE).await?;
        self.topics.set_audit_thread(thread_id).await?;
        info!(thread_id, "created audit thread");
        if let Err(e) = self
            .gateway
            .send_message(
                Destination::thread(self.staff_chat, thread_id),
                AUDIT_THREAD_INTRO,
                None,
            )
            .await
        {
            warn!(thread_id, error = %e, "failed to post audit thread intro");
        }
        Ok(thread_id)
    }

    pub async fn is_audit_thread(&self, thread_id: i64) -> Result<bool> {
        Ok(self.topics.audit_thread().await? == Some(thread_id))
    }
}

fn profile_card(correspondent: i64, profile: &Profile) -> String {
    let mut card = String::from("<b>📋 Correspondent</b>\n━━━━━━━━━━━━━━━\n");
    card.push_str(&format!("• ID: <code>{correspondent}</code>\n"));
    card.push_str(&format!("• Name: {}\n", profile.display_name));
    if profile.handle.is_some() {
        card.push_str(&format!("• Handle: {}\n", profile.handle_label()));
    }
    card.push_str(&format!(
        "• Language: {} {}\n",
        profile.language_tag.as_deref().unwrap_or("unknown"),
        profile.flag()
    ));
    card.push_str(&format!("━━━━━━━━━━━━━━━\n#id{correspondent}"));
    card
}
