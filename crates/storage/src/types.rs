use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChatId, MessageId};

/// Title given to chats created from the "new chat" action.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Version written into every persisted envelope.
pub const PERSISTED_STATE_VERSION: u32 = 0;

/// One turn in a chat. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub content: String,
    #[serde(rename = "isUser")]
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        id: MessageId,
        content: impl Into<String>,
        is_user: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            is_user,
            timestamp,
        }
    }

    /// Creates a user-authored message stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageId::with_prefix("user"), content, true, Utc::now())
    }

    /// Creates an assistant-authored message stamped now.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageId::with_prefix("ai"), content, false, Utc::now())
    }
}

/// A conversation: ordered messages plus title and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "_id")]
    pub id: ChatId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Creates an empty chat whose creation and update times are both `now`.
    pub fn new(id: ChatId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends in call order and bumps `updated_at` to `at` or the message time,
    /// whichever is later.
    ///
    /// `updated_at` never moves backwards, so it stays `>= created_at`.
    pub fn push_message(&mut self, message: Message, at: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(at).max(message.timestamp);
        self.messages.push(message);
    }

    pub fn set_title(&mut self, title: impl Into<String>, at: DateTime<Utc>) {
        self.title = title.into();
        self.updated_at = self.updated_at.max(at);
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Content of the newest message, shown under the title in chat lists.
    pub fn preview(&self) -> Option<&str> {
        self.messages.last().map(|message| message.content.as_str())
    }

    /// Case-insensitive match on the title or any message body.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.title.to_lowercase().contains(&needle)
            || self
                .messages
                .iter()
                .any(|message| message.content.to_lowercase().contains(&needle))
    }
}

/// The persisted `{chats, activeChat, isLoading}` triple.
///
/// `activeChatId` is written alongside `activeChat` so an active id with no
/// matching chat survives a reload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub chats: Vec<Chat>,
    #[serde(default)]
    pub active_chat: Option<Chat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_chat_id: Option<ChatId>,
    #[serde(default)]
    pub is_loading: bool,
}

impl PersistedState {
    /// The active id, preferring the explicit id over the embedded chat.
    pub fn resolved_active_chat_id(&self) -> Option<ChatId> {
        self.active_chat_id
            .clone()
            .or_else(|| self.active_chat.as_ref().map(|chat| chat.id.clone()))
    }
}

/// Versioned wrapper written to the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEnvelope {
    pub state: PersistedState,
    #[serde(default)]
    pub version: u32,
}

impl PersistedEnvelope {
    pub fn current(state: PersistedState) -> Self {
        Self {
            state,
            version: PERSISTED_STATE_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn updated_at_tracks_last_appended_message() {
        let mut chat = Chat::new(ChatId::new("c1"), "Test", at(0));

        for step in 1..=5 {
            chat.push_message(
                Message::new(
                    MessageId::new(format!("m{step}")),
                    format!("body {step}"),
                    step % 2 == 1,
                    at(step),
                ),
                at(step),
            );
        }

        assert_eq!(chat.updated_at, at(5));
        let ids = chat
            .messages
            .iter()
            .map(|message| message.id.as_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m4", "m5"]);
    }

    #[test]
    fn updated_at_never_precedes_created_at() {
        let mut chat = Chat::new(ChatId::new("c1"), "Test", at(100));
        chat.push_message(Message::new(MessageId::new("old"), "late", true, at(10)), at(20));
        chat.set_title("Renamed", at(50));

        assert_eq!(chat.updated_at, at(100));
        assert!(chat.updated_at >= chat.created_at);
        assert_eq!(chat.title, "Renamed");
    }

    #[test]
    fn append_bumps_updated_at_past_an_older_message_time() {
        let mut chat = Chat::new(ChatId::new("c1"), "Test", at(0));
        chat.set_title("Renamed", at(30));

        chat.push_message(Message::new(MessageId::new("ai"), "reply", false, at(10)), at(40));

        assert_eq!(chat.updated_at, at(40));
        assert_eq!(chat.messages[0].timestamp, at(10));
    }

    #[test]
    fn active_id_falls_back_to_embedded_chat() {
        let chat = Chat::new(ChatId::new("1"), "Hello", at(0));
        let legacy = PersistedState {
            chats: vec![chat.clone()],
            active_chat: Some(chat.clone()),
            active_chat_id: None,
            is_loading: false,
        };
        assert_eq!(legacy.resolved_active_chat_id(), Some(ChatId::new("1")));

        let dangling = PersistedState {
            chats: vec![chat],
            active_chat: None,
            active_chat_id: Some(ChatId::new("ghost")),
            is_loading: false,
        };
        assert_eq!(dangling.resolved_active_chat_id(), Some(ChatId::new("ghost")));
    }

    #[test]
    fn query_matches_title_or_message_body() {
        let mut chat = Chat::new(ChatId::new("c1"), "NIRx Product Information", at(0));
        chat.push_message(
            Message::new(
                MessageId::new("m1"),
                "Tell me about the Aurora system",
                true,
                at(2),
            ),
            at(2),
        );

        assert!(chat.matches_query("product"));
        assert!(chat.matches_query("AURORA"));
        assert!(chat.matches_query("  "));
        assert!(!chat.matches_query("billing"));
        assert_eq!(chat.preview(), Some("Tell me about the Aurora system"));
    }

    #[test]
    fn persisted_state_uses_wire_field_names() {
        let chat = Chat::new(ChatId::new("1"), "Hello", at(0));
        let state = PersistedState {
            chats: vec![chat.clone()],
            active_chat: Some(chat),
            active_chat_id: None,
            is_loading: false,
        };

        let value = serde_json::to_value(PersistedEnvelope::current(state)).unwrap();
        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["isLoading"], false);
        assert_eq!(value["state"]["activeChat"]["_id"], "1");
        assert!(value["state"]["chats"][0]["createdAt"].is_string());
    }
}
