use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chatdesk_client::{ChatClient, SendOutcome};
use chatdesk_storage::{Chat, ChatId, DEFAULT_CHAT_TITLE};
use tokio::sync::broadcast;

use super::events::Notice;
use super::store::ChatStore;

/// Titles derived from a first message are cut to this many characters.
pub const AUTO_TITLE_MAX_CHARS: usize = 50;

const NOTICE_CHANNEL_CAPACITY: usize = 16;

/// Drives the chat client and writes its results into the store, the way the
/// sidebar and thread views do.
pub struct ChatSession {
    store: Arc<ChatStore>,
    client: Arc<dyn ChatClient>,
    reply_delay: Duration,
    creating_chat: AtomicBool,
    notices: broadcast::Sender<Notice>,
}

impl ChatSession {
    pub fn new(store: Arc<ChatStore>, client: Arc<dyn ChatClient>, reply_delay: Duration) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            store,
            client,
            reply_delay,
            creating_chat: AtomicBool::new(false),
            notices,
        }
    }

    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Fills an empty store from the client. Stores that already hold chats are left alone.
    pub async fn load_chats(&self) {
        if !self.store.snapshot().chats.is_empty() {
            return;
        }

        self.store.set_loading(true);
        match self.client.list_chats().await {
            Ok(chats) => {
                tracing::info!(chat_count = chats.len(), "loaded chats");
                for chat in chats {
                    self.store.add_chat(chat);
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load chats");
                self.notify(Notice::error(error.to_string()));
            }
        }
        self.store.set_loading(false);
    }

    /// Creates and activates a "New Chat". Returns `None` while another creation is in flight
    /// or when the client fails.
    pub async fn new_chat(&self) -> Option<ChatId> {
        if self.creating_chat.swap(true, Ordering::AcqRel) {
            tracing::debug!("chat creation already in progress");
            return None;
        }

        let created = match self.client.create_chat(DEFAULT_CHAT_TITLE).await {
            Ok(chat) => {
                let chat_id = chat.id.clone();
                self.store.add_chat(chat);
                self.notify(Notice::success("New chat created successfully"));
                Some(chat_id)
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to create chat");
                self.notify(Notice::error(error.to_string()));
                None
            }
        };

        self.creating_chat.store(false, Ordering::Release);
        created
    }

    /// Deletes on the client first and drops the chat locally only once that succeeded.
    pub async fn delete_chat(&self, chat_id: &ChatId) -> bool {
        match self.client.delete_chat(chat_id).await {
            Ok(true) => {
                self.store.delete_chat(chat_id);
                self.notify(Notice::success("Chat deleted successfully"));
                true
            }
            Ok(false) => {
                tracing::warn!(chat_id = %chat_id, "client declined chat deletion");
                self.notify(Notice::error("Failed to delete chat"));
                false
            }
            Err(error) => {
                tracing::warn!(chat_id = %chat_id, error = %error, "failed to delete chat");
                self.notify(Notice::error(error.to_string()));
                false
            }
        }
    }

    pub fn select_chat(&self, chat_id: Option<ChatId>) {
        self.store.set_active_chat(chat_id);
    }

    /// Sends `content` in the active chat and appends both turns.
    ///
    /// Ignored when the trimmed content is empty, no chat is active, or a
    /// previous send is still loading. Backend failures arrive as the reply.
    pub async fn send_message(&self, content: &str) -> Option<SendOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let snapshot = self.store.snapshot();
        if snapshot.is_loading {
            tracing::debug!("send ignored while a previous send is loading");
            return None;
        }
        let active = snapshot.active_chat()?;
        let chat_id = active.id.clone();
        let needs_title = active.messages.is_empty() && active.title == DEFAULT_CHAT_TITLE;

        self.store.set_loading(true);
        let outcome = self.client.send_message(&chat_id, content).await;

        self.store
            .add_message(&chat_id, outcome.user_message.clone());
        if needs_title {
            self.store.update_chat_title(&chat_id, title_from_content(content));
        }

        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }

        self.store.add_message(&chat_id, outcome.ai_message.clone());
        self.store.set_loading(false);
        Some(outcome)
    }

    /// Chats whose title or messages contain `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<Chat> {
        self.store
            .snapshot()
            .chats
            .iter()
            .filter(|chat| chat.matches_query(query))
            .cloned()
            .collect()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}

/// Derives a chat title from its first message.
pub fn title_from_content(content: &str) -> String {
    if content.chars().count() > AUTO_TITLE_MAX_CHARS {
        let head = content.chars().take(AUTO_TITLE_MAX_CHARS).collect::<String>();
        format!("{head}...")
    } else {
        content.to_string()
    }
}
