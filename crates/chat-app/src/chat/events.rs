use chatdesk_storage::{ChatId, MessageId};

/// Emitted by the store after a mutation changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// State was replaced by the persisted snapshot.
    Rehydrated,
    ChatAdded {
        chat_id: ChatId,
    },
    ActiveChatChanged {
        chat_id: Option<ChatId>,
    },
    MessageAdded {
        chat_id: ChatId,
        message_id: MessageId,
    },
    ChatDeleted {
        chat_id: ChatId,
        cleared_active: bool,
    },
    LoadingChanged {
        is_loading: bool,
    },
    TitleChanged {
        chat_id: ChatId,
        title: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient notification for the host to show as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: "Success".to_string(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".to_string(),
            description: description.into(),
        }
    }
}
