//! Bidirectional copy engine with id mapping and edit/delete replay.

use std::{sync::Arc, time::Duration};

use {
    doorman_common::time,
    tracing::{debug, warn},
};

use crate::{
    error::Result,
    gateway::{Destination, Marker, MediaRef, MessagingGateway},
    mapping::Side,
    records::MappingRepo,
    topics::TopicRouter,
};

/// How long a transient reaction marker stays visible before being cleared.
pub const MARKER_DELAY: Duration = Duration::from_secs(1);

/// Content of an edited message, reduced to what the replay needs.
#[derive(Debug, Clone, Default)]
pub struct EditContent {
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<MediaRef>,
}

#[derive(Clone)]
pub struct RelayEngine {
    gateway: Arc<dyn MessagingGateway>,
    mappings: MappingRepo,
    topics: TopicRouter,
    staff_chat: i64,
    marker_delay: Duration,
}

impl RelayEngine {
    #[must_use]
    pub fn new(gateway: Arc<dyn MessagingGateway>, mappings: MappingRepo, topics: TopicRouter) -> Self {
        let staff_chat = topics.staff_chat();
        Self {
            gateway,
            mappings,
            topics,
            staff_chat,
            marker_delay: MARKER_DELAY,
        }
    }

    /// Shorten the marker-clear delay; used by tests.
    #[must_use]
    pub fn with_marker_delay(mut self, delay: Duration) -> Self {
        self.marker_delay = delay;
        self
    }

    /// Copy a correspondent's message into their staff thread, creating
    /// the thread on first contact. Returns the staff-side message id.
    pub async fn relay_inbound(
        &self,
        correspondent: i64,
        message_id: i64,
        reply_to: Option<i64>,
    ) -> Result<i64> {
        self.mark(correspondent, message_id, Some(Marker::Received)).await;
        let result = self.relay_inbound_inner(correspondent, message_id, reply_to).await;
        // The marker clears after the delay whatever the relay outcome.
        tokio::time::sleep(self.marker_delay).await;
        self.mark(correspondent, message_id, None).await;
        result
    }

    async fn relay_inbound_inner(
        &self,
        correspondent: i64,
        message_id: i64,
        reply_to: Option<i64>,
    ) -> Result<i64> {
        let thread_id = self.topics.ensure_thread(correspondent).await?;
        let mut table = self.mappings.load(correspondent).await?;

        let reply_target = reply_to
            .and_then(|id| table.counterpart(Side::Correspondent, id))
            .map(|entry| entry.counterpart);

        let copy_id = self
            .gateway
            .copy_message(
                correspondent,
                message_id,
                Destination::thread(self.staff_chat, thread_id),
                reply_target,
            )
            .await?;

        table.insert_pair(message_id, copy_id, thread_id, time::now_ms());
        self.mappings.save(correspondent, &table).await?;
        debug!(correspondent, message_id, copy_id, "relayed inbound message");
        Ok(copy_id)
    }

    /// Copy a staff message from a correspondent thread to the
    /// correspondent. Returns `None` for the audit thread and unbound
    /// threads (no-op), otherwise the correspondent-side message id.
    pub async fn relay_outbound(
        &self,
        thread_id: i64,
        message_id: i64,
        reply_to: Option<i64>,
    ) -> Result<Option<i64>> {
        if self.topics.is_audit_thread(thread_id).await? {
            return Ok(None);
        }
        let Some(correspondent) = self.topics.resolve_correspondent(thread_id).await? else {
            return Ok(None);
        };

        self.mark(self.staff_chat, message_id, Some(Marker::Received)).await;
        let result = self
            .relay_outbound_inner(correspondent, thread_id, message_id, reply_to)
            .await;
        tokio::time::sleep(self.marker_delay).await;
        self.mark(self.staff_chat, message_id, None).await;
        result.map(Some)
    }

    async fn relay_outbound_inner(
        &self,
        correspondent: i64,
        thread_id: i64,
        message_id: i64,
        reply_to: Option<i64>,
    ) -> Result<i64> {
        let mut table = self.mappings.load(correspondent).await?;

        let reply_target = reply_to
            .and_then(|id| table.counterpart(Side::Staff, id))
            .map(|entry| entry.counterpart);

        let copy_id = self
            .gateway
            .copy_message(
                self.staff_chat,
                message_id,
                Destination::chat(correspondent),
                reply_target,
            )
            .await?;

        table.insert_pair(copy_id, message_id, thread_id, time::now_ms());
        self.mappings.save(correspondent, &table).await?;
        debug!(correspondent, message_id, copy_id, "relayed outbound message");
        Ok(copy_id)
    }

    /// Replay an edit onto the counterpart message.
    ///
    /// An id with no counterpart in the table is a silent no-op: the pair
    /// may simply have aged out of the retention window.
    pub async fn sync_edit(
        &self,
        correspondent: i64,
        side: Side,
        message_id: i64,
        content: &EditContent,
    ) -> Result<()> {
        let table = self.mappings.load(correspondent).await?;
        let Some(entry) = table.counterpart(side, message_id) else {
            debug!(correspondent, message_id, "edit has no mapped counterpart");
            return Ok(());
        };
        let counterpart = entry.counterpart;
        let (source_chat, target_chat) = self.chats_for(correspondent, side);

        self.mark(source_chat, message_id, Some(Marker::Edited)).await;
        if let Err(e) = self.apply_edit(target_chat, counterpart, content).await {
            warn!(correspondent, message_id, error = %e, "edit replay failed");
        }
        self.mark(target_chat, counterpart, Some(Marker::Edited)).await;

        tokio::time::sleep(self.marker_delay).await;
        self.mark(source_chat, message_id, None).await;
        self.mark(target_chat, counterpart, None).await;
        Ok(())
    }

    async fn apply_edit(
        &self,
        chat_id: i64,
        message_id: i64,
        content: &EditContent,
    ) -> Result<()> {
        if let Some(text) = &content.text {
            return self.gateway.edit_text(chat_id, message_id, text).await;
        }
        if let Some(caption) = &content.caption {
            if let Some(media) = &content.media {
                // Media replace carries the caption along; when the
                // platform rejects it (media unchanged), fall back to a
                // caption-only edit.
                match self.gateway.edit_media(chat_id, message_id, media, caption).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        debug!(message_id, error = %e, "media edit rejected, editing caption only");
                    },
                }
            }
            return self.gateway.edit_caption(chat_id, message_id, caption).await;
        }
        debug!(message_id, "edited message carries nothing to replay");
        Ok(())
    }

    /// Delete a relayed pair on both sides, plus the `/del` command
    /// message itself when provided.
    ///
    /// The mapping entry is removed unconditionally, even when one of the
    /// deletes fails, so the table never retains stale pointers. Returns
    /// `false` when the id had no mapped counterpart.
    pub async fn sync_delete(
        &self,
        correspondent: i64,
        side: Side,
        message_id: i64,
        command_id: Option<i64>,
    ) -> Result<bool> {
        let (local_chat, counterpart_chat) = self.chats_for(correspondent, side);
        let mut table = self.mappings.load(correspondent).await?;

        let Some(entry) = table.remove_pair(side, message_id) else {
            // Tidy the command message even when nothing can be deleted.
            if let Some(command_id) = command_id {
                self.delete_quietly(local_chat, command_id).await;
            }
            return Ok(false);
        };

        self.delete_quietly(local_chat, message_id).await;
        self.delete_quietly(counterpart_chat, entry.counterpart).await;
        if let Some(command_id) = command_id
            && command_id != message_id
        {
            self.delete_quietly(local_chat, command_id).await;
        }

        self.mappings.save(correspondent, &table).await?;
        Ok(true)
    }

    fn chats_for(&self, correspondent: i64, side: Side) -> (i64, i64) {
        match side {
            Side::Correspondent => (correspondent, self.staff_chat),
            Side::Staff => (self.staff_chat, correspondent),
        }
    }

    async fn delete_quietly(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.gateway.delete_message(chat_id, message_id).await {
            warn!(chat_id, message_id, error = %e, "delete failed");
        }
    }

    async fn mark(&self, chat_id: i64, message_id: i64, marker: Option<Marker>) {
        if let Err(e) = self.gateway.react(chat_id, message_id, marker).await {
            debug!(chat_id, message_id, error = %e, "reaction marker failed");
        }
    }
}
