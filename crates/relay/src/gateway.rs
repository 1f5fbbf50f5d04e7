//! Messaging-platform seam.
//!
//! The relay core addresses everything by chat id, thread id, and message
//! id; `doorman-telegram` implements this trait over the Bot API. Every
//! call is fallible and rate-limited by the platform; the core never
//! retries.

use {async_trait::async_trait, doorman_common::keyboard::Keyboard};

use crate::error::Result;

/// Where a message is sent: a chat, optionally inside a discussion thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
}

impl Destination {
    #[must_use]
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            thread_id: None,
        }
    }

    #[must_use]
    pub fn thread(chat_id: i64, thread_id: i64) -> Self {
        Self {
            chat_id,
            thread_id: Some(thread_id),
        }
    }
}

/// Transient reaction marker applied to a message during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Message received and queued for relay.
    Received,
    /// Edit sync in flight.
    Edited,
}

/// Reference to an attachment carried by a message, used when an edit has
/// to replace media rather than text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Animation,
    Audio,
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a text message; returns the new message id.
    async fn send_message(
        &self,
        dest: Destination,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<i64>;

    /// Copy a message across chats without a forward header; returns the
    /// id of the copy.
    async fn copy_message(
        &self,
        from_chat: i64,
        message_id: i64,
        dest: Destination,
        reply_to: Option<i64>,
    ) -> Result<i64>;

    async fn edit_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()>;

    async fn edit_caption(&self, chat_id: i64, message_id: i64, caption: &str) -> Result<()>;

    /// Replace a message's media keeping it in place, with a new caption.
    async fn edit_media(
        &self,
        chat_id: i64,
        message_id: i64,
        media: &MediaRef,
        caption: &str,
    ) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Apply a transient marker reaction, or clear all reactions with `None`.
    async fn react(&self, chat_id: i64, message_id: i64, marker: Option<Marker>) -> Result<()>;

    /// Create a discussion thread in the staff chat; returns the thread id.
    async fn create_thread(&self, title: &str) -> Result<i64>;

    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<()>;
}
