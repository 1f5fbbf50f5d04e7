//! Inbound webhook payload model, reduced to the fields the handlers use.

use {
    doorman_common::types::Profile,
    doorman_relay::gateway::{MediaKind, MediaRef},
    serde::Deserialize,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub message_thread_id: Option<i64>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<FileRef>>,
    #[serde(default)]
    pub video: Option<FileRef>,
    #[serde(default)]
    pub document: Option<FileRef>,
    #[serde(default)]
    pub animation: Option<FileRef>,
    #[serde(default)]
    pub audio: Option<FileRef>,
}

impl Message {
    /// The attachment an edit would have to replace, if any.
    ///
    /// Photos arrive as a size ladder; the last entry is the largest.
    #[must_use]
    pub fn media_ref(&self) -> Option<MediaRef> {
        if let Some(sizes) = &self.photo
            && let Some(largest) = sizes.last()
        {
            return Some(MediaRef {
                kind: MediaKind::Photo,
                file_id: largest.file_id.clone(),
            });
        }
        // Animation before document: Telegram attaches both to GIFs.
        let single = [
            (MediaKind::Animation, &self.animation),
            (MediaKind::Video, &self.video),
            (MediaKind::Audio, &self.audio),
            (MediaKind::Document, &self.document),
        ];
        for (kind, slot) in single {
            if let Some(file) = slot {
                return Some(MediaRef {
                    kind,
                    file_id: file.file_id.clone(),
                });
            }
        }
        None
    }

    /// The id of the message this one replies to, when present.
    #[must_use]
    pub fn reply_target(&self) -> Option<i64> {
        self.reply_to_message.as_ref().map(|m| m.message_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl User {
    #[must_use]
    pub fn profile(&self) -> Profile {
        let display_name = match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        };
        Profile {
            display_name,
            handle: self.username.clone(),
            language_tag: self.language_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[cfg(test)]
mod tests {
    use {serde_json::json, super::*};

    #[test]
    fn minimal_text_update_deserializes() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": 501,
                "from": { "id": 1001, "first_name": "Alice", "language_code": "en" },
                "chat": { "id": 1001 },
                "text": "hello"
            }
        }))
        .unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.message_id, 501);
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert!(msg.media_ref().is_none());
        assert!(msg.reply_target().is_none());
    }

    #[test]
    fn photo_edit_picks_the_largest_size() {
        let msg: Message = serde_json::from_value(json!({
            "message_id": 7,
            "chat": { "id": 1001 },
            "caption": "look",
            "photo": [
                { "file_id": "small" },
                { "file_id": "medium" },
                { "file_id": "large" }
            ]
        }))
        .unwrap();
        let media = msg.media_ref().unwrap();
        assert_eq!(media.kind, MediaKind::Photo);
        assert_eq!(media.file_id, "large");
    }

    #[test]
    fn animation_wins_over_its_document_shadow() {
        let msg: Message = serde_json::from_value(json!({
            "message_id": 7,
            "chat": { "id": 1001 },
            "animation": { "file_id": "anim" },
            "document": { "file_id": "doc" }
        }))
        .unwrap();
        assert_eq!(msg.media_ref().unwrap().kind, MediaKind::Animation);
    }

    #[test]
    fn profile_joins_names_and_carries_handle() {
        let user = User {
            id: 1001,
            first_name: "Alice".into(),
            last_name: Some("Smith".into()),
            username: Some("alice".into()),
            language_code: Some("en".into()),
        };
        let profile = user.profile();
        assert_eq!(profile.display_name, "Alice Smith");
        assert_eq!(profile.handle.as_deref(), Some("alice"));
    }

    #[test]
    fn callback_update_deserializes() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb1",
                "from": { "id": 1001, "first_name": "Alice" },
                "data": "verify_42",
                "message": {
                    "message_id": 600,
                    "chat": { "id": 1001 }
                }
            }
        }))
        .unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("verify_42"));
        assert_eq!(query.message.unwrap().message_id, 600);
    }
}
