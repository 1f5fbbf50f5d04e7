//! Bot API backing for the relay's messaging seam.

use {
    async_trait::async_trait,
    doorman_common::keyboard::Keyboard,
    doorman_relay::gateway::{Destination, Marker, MediaKind, MediaRef, MessagingGateway},
    serde_json::{Value, json},
};

use crate::{api::BotApi, markup};

/// Implements the relay's gateway over raw Bot API calls. Thread creation
/// always targets the staff chat; everything else is fully addressed by
/// the caller.
#[derive(Clone)]
pub struct TelegramGateway {
    api: BotApi,
    staff_chat: i64,
}

impl TelegramGateway {
    #[must_use]
    pub fn new(api: BotApi, staff_chat: i64) -> Self {
        Self { api, staff_chat }
    }
}

fn relay_err(e: crate::error::Error) -> doorman_relay::Error {
    match e {
        crate::error::Error::Api { method, description } => {
            doorman_relay::Error::gateway(method, description)
        },
        other => doorman_relay::Error::gateway("bot api", other.to_string()),
    }
}

fn marker_emoji(marker: Marker) -> &'static str {
    match marker {
        Marker::Received => "👍",
        Marker::Edited => "✍",
    }
}

fn media_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo",
        MediaKind::Video => "video",
        MediaKind::Document => "document",
        MediaKind::Animation => "animation",
        MediaKind::Audio => "audio",
    }
}

fn with_thread(mut params: Value, dest: Destination) -> Value {
    if let Some(thread_id) = dest.thread_id {
        params["message_thread_id"] = json!(thread_id);
    }
    params
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_message(
        &self,
        dest: Destination,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> doorman_relay::Result<i64> {
        let mut params = with_thread(
            json!({
                "chat_id": dest.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }),
            dest,
        );
        if let Some(keyboard) = keyboard {
            params["reply_markup"] = markup::to_reply_markup(keyboard);
        }
        self.api
            .call_for_message_id("sendMessage", &params)
            .await
            .map_err(relay_err)
    }

    async fn copy_message(
        &self,
        from_chat: i64,
        message_id: i64,
        dest: Destination,
        reply_to: Option<i64>,
    ) -> doorman_relay::Result<i64> {
        let mut params = with_thread(
            json!({
                "chat_id": dest.chat_id,
                "from_chat_id": from_chat,
                "message_id": message_id,
            }),
            dest,
        );
        if let Some(reply_to) = reply_to {
            params["reply_parameters"] = json!({
                "message_id": reply_to,
                "allow_sending_without_reply": true,
            });
        }
        self.api
            .call_for_message_id("copyMessage", &params)
            .await
            .map_err(relay_err)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> doorman_relay::Result<()> {
        self.api
            .call("editMessageText", &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .await
            .map_err(relay_err)?;
        Ok(())
    }

    async fn edit_caption(
        &self,
        chat_id: i64,
        message_id: i64,
        caption: &str,
    ) -> doorman_relay::Result<()> {
        self.api
            .call("editMessageCaption", &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "caption": caption,
                "parse_mode": "HTML",
            }))
            .await
            .map_err(relay_err)?;
        Ok(())
    }

    async fn edit_media(
        &self,
        chat_id: i64,
        message_id: i64,
        media: &MediaRef,
        caption: &str,
    ) -> doorman_relay::Result<()> {
        self.api
            .call("editMessageMedia", &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "media": {
                    "type": media_type(media.kind),
                    "media": media.file_id,
                    "caption": caption,
                    "parse_mode": "HTML",
                },
            }))
            .await
            .map_err(relay_err)?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> doorman_relay::Result<()> {
        self.api
            .call("deleteMessage", &json!({
                "chat_id": chat_id,
                "message_id": message_id,
            }))
            .await
            .map_err(relay_err)?;
        Ok(())
    }

    async fn react(
        &self,
        chat_id: i64,
        message_id: i64,
        marker: Option<Marker>,
    ) -> doorman_relay::Result<()> {
        let reaction = match marker {
            Some(marker) => json!([{ "type": "emoji", "emoji": marker_emoji(marker) }]),
            None => json!([]),
        };
        self.api
            .call("setMessageReaction", &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "reaction": reaction,
            }))
            .await
            .map_err(relay_err)?;
        Ok(())
    }

    async fn create_thread(&self, title: &str) -> doorman_relay::Result<i64> {
        let result = self
            .api
            .call("createForumTopic", &json!({
                "chat_id": self.staff_chat,
                "name": title,
            }))
            .await
            .map_err(relay_err)?;
        result
            .get("message_thread_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                doorman_relay::Error::gateway("createForumTopic", "missing message_thread_id")
            })
    }

    async fn pin_message(&self, chat_id: i64, message_id: i64) -> doorman_relay::Result<()> {
        self.api
            .call("pinChatMessage", &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "disable_notification": true,
            }))
            .await
            .map_err(relay_err)?;
        Ok(())
    }
}
