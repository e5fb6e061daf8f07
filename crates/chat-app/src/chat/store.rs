use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chatdesk_storage::{Chat, ChatId, Message, PersistedState, StateStorage};
use chrono::Utc;
use tokio::sync::broadcast;

use super::events::StoreEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One immutable snapshot of the chat state.
///
/// Each chat is held once; the active chat is an id into `chats`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatState {
    /// Newest first.
    pub chats: Vec<Chat>,
    pub active_chat_id: Option<ChatId>,
    pub is_loading: bool,
}

impl ChatState {
    pub fn chat(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|chat| &chat.id == chat_id)
    }

    /// Resolves the active id. `None` if nothing is active or the id has no chat.
    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id
            .as_ref()
            .and_then(|chat_id| self.chat(chat_id))
    }

    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            chats: self.chats.clone(),
            active_chat: self.active_chat().cloned(),
            active_chat_id: self.active_chat_id.clone(),
            is_loading: self.is_loading,
        }
    }

    pub fn from_persisted(persisted: PersistedState) -> Self {
        Self {
            active_chat_id: persisted.resolved_active_chat_id(),
            chats: persisted.chats,
            is_loading: persisted.is_loading,
        }
    }
}

/// Single source of truth for chats, the active chat and the loading flag.
///
/// Mutations are synchronous and never fail. Each one swaps in a new snapshot,
/// saves it under the store's namespace, and notifies subscribers. Unknown ids
/// are ignored without saving or notifying.
pub struct ChatStore {
    state: ArcSwap<ChatState>,
    write_lock: Mutex<()>,
    storage: Arc<dyn StateStorage>,
    namespace: String,
    events: broadcast::Sender<StoreEvent>,
}

impl ChatStore {
    /// Creates an empty store without reading storage.
    pub fn new(storage: Arc<dyn StateStorage>, namespace: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: ArcSwap::from_pointee(ChatState::default()),
            write_lock: Mutex::new(()),
            storage,
            namespace: namespace.into(),
            events,
        }
    }

    /// Creates a store seeded from whatever was last persisted.
    pub fn open(storage: Arc<dyn StateStorage>, namespace: impl Into<String>) -> Self {
        let store = Self::new(storage, namespace);
        store.rehydrate();
        store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn snapshot(&self) -> Arc<ChatState> {
        self.state.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replaces in-memory state with the persisted snapshot.
    ///
    /// Missing or unreadable state leaves the store empty.
    pub fn rehydrate(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let state = match self.storage.load(&self.namespace) {
            Ok(Some(persisted)) => ChatState::from_persisted(persisted),
            Ok(None) => ChatState::default(),
            Err(error) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    error = %error,
                    "failed to rehydrate chat state; starting empty"
                );
                ChatState::default()
            }
        };

        tracing::info!(
            namespace = %self.namespace,
            chat_count = state.chats.len(),
            "rehydrated chat state"
        );
        self.state.store(Arc::new(state));
        let _ = self.events.send(StoreEvent::Rehydrated);
    }

    /// Prepends `chat` and makes it active. Duplicate ids are not checked.
    pub fn add_chat(&self, chat: Chat) {
        self.mutate("add-chat", |state| {
            let chat_id = chat.id.clone();
            state.chats.insert(0, chat);
            state.active_chat_id = Some(chat_id.clone());
            Some(StoreEvent::ChatAdded { chat_id })
        });
    }

    /// Points the active chat at `chat_id` without checking that it exists.
    pub fn set_active_chat(&self, chat_id: Option<ChatId>) {
        self.mutate("set-active-chat", |state| {
            state.active_chat_id = chat_id.clone();
            Some(StoreEvent::ActiveChatChanged { chat_id })
        });
    }

    /// Appends to every chat with `chat_id` and bumps its `updated_at` to now.
    pub fn add_message(&self, chat_id: &ChatId, message: Message) {
        self.mutate("add-message", |state| {
            let now = Utc::now();
            let message_id = message.id.clone();
            let mut matched = false;

            for chat in state.chats.iter_mut().filter(|chat| &chat.id == chat_id) {
                chat.push_message(message.clone(), now);
                matched = true;
            }

            matched.then(|| StoreEvent::MessageAdded {
                chat_id: chat_id.clone(),
                message_id,
            })
        });
    }

    pub fn delete_chat(&self, chat_id: &ChatId) {
        self.mutate("delete-chat", |state| {
            let before = state.chats.len();
            state.chats.retain(|chat| &chat.id != chat_id);
            if state.chats.len() == before {
                return None;
            }

            let cleared_active = state.active_chat_id.as_ref() == Some(chat_id);
            if cleared_active {
                state.active_chat_id = None;
            }

            Some(StoreEvent::ChatDeleted {
                chat_id: chat_id.clone(),
                cleared_active,
            })
        });
    }

    /// Last writer wins; there is no nesting count.
    pub fn set_loading(&self, is_loading: bool) {
        self.mutate("set-loading", |state| {
            state.is_loading = is_loading;
            Some(StoreEvent::LoadingChanged { is_loading })
        });
    }

    pub fn update_chat_title(&self, chat_id: &ChatId, title: impl Into<String>) {
        let title = title.into();
        self.mutate("update-chat-title", |state| {
            let now = Utc::now();
            let mut matched = false;

            for chat in state.chats.iter_mut().filter(|chat| &chat.id == chat_id) {
                chat.set_title(title.clone(), now);
                matched = true;
            }

            matched.then(|| StoreEvent::TitleChanged {
                chat_id: chat_id.clone(),
                title: title.clone(),
            })
        });
    }

    fn mutate<F>(&self, stage: &'static str, apply: F)
    where
        F: FnOnce(&mut ChatState) -> Option<StoreEvent>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = ChatState::clone(&self.state.load());
        let Some(event) = apply(&mut next) else {
            tracing::debug!(stage, "store mutation matched nothing; state unchanged");
            return;
        };

        if let Err(error) = self.storage.save(&self.namespace, &next.to_persisted()) {
            tracing::warn!(
                stage,
                namespace = %self.namespace,
                error = %error,
                "failed to persist chat state"
            );
        }

        self.state.store(Arc::new(next));
        tracing::debug!(stage, event = ?event, "store mutated");
        // No receivers is fine; nobody is watching yet.
        let _ = self.events.send(event);
    }
}
