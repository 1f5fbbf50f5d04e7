//! Recording fake of the messaging gateway for unit tests.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicI64, Ordering},
};

use {async_trait::async_trait, doorman_common::keyboard::Keyboard};

use crate::{
    error::{Error, Result},
    gateway::{Destination, Marker, MediaRef, MessagingGateway},
};

#[derive(Debug, Clone)]
pub enum Call {
    Send {
        dest: Destination,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Copy {
        from_chat: i64,
        message_id: i64,
        dest: Destination,
        reply_to: Option<i64>,
        new_id: i64,
    },
    EditText {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    EditCaption {
        chat_id: i64,
        message_id: i64,
        caption: String,
    },
    EditMedia {
        chat_id: i64,
        message_id: i64,
        file_id: String,
        caption: String,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    React {
        chat_id: i64,
        message_id: i64,
        marker: Option<Marker>,
    },
    CreateThread {
        title: String,
        thread_id: i64,
    },
    Pin {
        chat_id: i64,
        message_id: i64,
    },
}

#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI64,
    next_thread_id: AtomicI64,
    fail_create_thread: AtomicBool,
    fail_copy: AtomicBool,
    fail_edit_media: AtomicBool,
    fail_delete_of: Mutex<Vec<i64>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI64::new(900),
            next_thread_id: AtomicI64::new(70),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn fail_create_thread(&self, fail: bool) {
        self.fail_create_thread.store(fail, Ordering::SeqCst);
    }

    pub fn fail_copy(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_edit_media(&self, fail: bool) {
        self.fail_edit_media.store(fail, Ordering::SeqCst);
    }

    /// Make `delete_message` fail for one specific message id.
    pub fn fail_delete_of(&self, message_id: i64) {
        self.fail_delete_of
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message_id);
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_message(
        &self,
        dest: Destination,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<i64> {
        self.record(Call::Send {
            dest,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn copy_message(
        &self,
        from_chat: i64,
        message_id: i64,
        dest: Destination,
        reply_to: Option<i64>,
    ) -> Result<i64> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(Error::gateway("copyMessage", "forbidden: bot was blocked"));
        }
        let new_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Copy {
            from_chat,
            message_id,
            dest,
            reply_to,
            new_id,
        });
        Ok(new_id)
    }

    async fn edit_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        self.record(Call::EditText {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_caption(&self, chat_id: i64, message_id: i64, caption: &str) -> Result<()> {
        self.record(Call::EditCaption {
            chat_id,
            message_id,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn edit_media(
        &self,
        chat_id: i64,
        message_id: i64,
        media: &MediaRef,
        caption: &str,
    ) -> Result<()> {
        if self.fail_edit_media.load(Ordering::SeqCst) {
            return Err(Error::gateway("editMessageMedia", "message media is unchanged"));
        }
        self.record(Call::EditMedia {
            chat_id,
            message_id,
            file_id: media.file_id.clone(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let fails = self
            .fail_delete_of
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&message_id);
        if fails {
            return Err(Error::gateway("deleteMessage", "message can't be deleted"));
        }
        self.record(Call::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn react(&self, chat_id: i64, message_id: i64, marker: Option<Marker>) -> Result<()> {
        self.record(Call::React {
            chat_id,
            message_id,
            marker,
        });
        Ok(())
    }

    async fn create_thread(&self, title: &str) -> Result<i64> {
        if self.fail_create_thread.load(Ordering::SeqCst) {
            return Err(Error::gateway("createForumTopic", "not enough rights"));
        }
        let thread_id = self.next_thread_id.fetch_add(1, Ordering::SeqCst);
        self.record(Call::CreateThread {
            title: title.to_string(),
            thread_id,
        });
        Ok(thread_id)
    }

    async fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.record(Call::Pin {
            chat_id,
            message_id,
        });
        Ok(())
    }
}
