//! Chat state, the session that drives the chat client, and application bootstrap.

pub mod app;
pub mod chat;
pub mod settings;

pub use app::{AppError, ChatDesk, open_storage};
pub use chat::{ChatSession, ChatState, ChatStore, Notice, NoticeLevel, StoreEvent};
pub use settings::{AppSettings, SettingsStore, StorageBackend};
