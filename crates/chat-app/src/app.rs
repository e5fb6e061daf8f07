use std::path::Path;
use std::sync::Arc;

use chatdesk_client::{ClientError, create_client};
use chatdesk_storage::{
    JsonFileStorage, MemoryStorage, SqliteStorage, StateStorage, StorageError, StorageResult,
};
use snafu::{ResultExt, Snafu};

use crate::chat::{ChatSession, ChatStore};
use crate::settings::{AppSettings, SettingsStore, StorageBackend};

pub const SQLITE_FILE_NAME: &str = "chatdesk.sqlite";

/// Everything a host needs to drive the chat: settings, the shared store and the session.
pub struct ChatDesk {
    settings: SettingsStore,
    store: Arc<ChatStore>,
    session: ChatSession,
}

impl ChatDesk {
    /// Loads settings from the default location and environment, then opens the store.
    pub fn bootstrap() -> Result<Self, AppError> {
        Self::from_settings(SettingsStore::load())
    }

    pub fn from_settings(settings: SettingsStore) -> Result<Self, AppError> {
        let current = settings.settings();
        let storage = open_storage(&current).context(StorageSnafu {
            stage: "bootstrap-open-storage",
        })?;
        let client = create_client(current.client_config()).context(ClientSnafu {
            stage: "bootstrap-create-client",
        })?;

        let store = Arc::new(ChatStore::open(storage, current.storage_namespace.clone()));
        // Nothing is in flight yet, so a set flag is left over from an interrupted send.
        if store.snapshot().is_loading {
            tracing::info!("clearing loading flag left by a previous run");
            store.set_loading(false);
        }
        let session = ChatSession::new(store.clone(), client, current.reply_delay());

        tracing::info!(
            backend = ?current.storage_backend,
            namespace = %current.storage_namespace,
            mode = ?current.client_mode,
            "chat desk ready"
        );

        Ok(Self {
            settings,
            store,
            session,
        })
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }
}

pub fn open_storage(settings: &AppSettings) -> StorageResult<Arc<dyn StateStorage>> {
    match settings.storage_backend {
        StorageBackend::Json => Ok(Arc::new(JsonFileStorage::new(settings.resolved_data_dir()))),
        StorageBackend::Sqlite => {
            let path = settings.resolved_data_dir().join(SQLITE_FILE_NAME);
            Ok(Arc::new(SqliteStorage::open_blocking(&path_to_location(
                &path,
            ))?))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}

fn path_to_location(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("failed to open chat storage on `{stage}`: {source}"))]
    Storage {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("failed to create chat client on `{stage}`: {source}"))]
    Client {
        stage: &'static str,
        source: ClientError,
    },
}

#[cfg(test)]
mod tests {
    use chatdesk_storage::{Chat, ChatId, DEFAULT_STATE_NAMESPACE, PersistedState};
    use chrono::Utc;

    use super::*;

    fn settings_in(dir: &Path, backend: StorageBackend) -> AppSettings {
        AppSettings {
            storage_backend: backend,
            data_dir: Some(dir.to_path_buf()),
            mock_latency: false,
            reply_delay_ms: 0,
            ..AppSettings::default()
        }
    }

    #[test]
    fn json_backend_persists_across_bootstraps() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path(), StorageBackend::Json);
        let config_path = dir.path().join("settings.json");

        let first =
            ChatDesk::from_settings(SettingsStore::fixed(settings.clone(), config_path.clone()))
                .unwrap();
        first
            .store()
            .add_chat(Chat::new(ChatId::new("kept"), "Kept", Utc::now()));

        assert!(
            dir.path()
                .join(format!("{DEFAULT_STATE_NAMESPACE}.json"))
                .exists()
        );

        let second = ChatDesk::from_settings(SettingsStore::fixed(settings, config_path)).unwrap();
        let state = second.store().snapshot();
        assert_eq!(state.chats.len(), 1);
        assert_eq!(state.active_chat_id, Some(ChatId::new("kept")));
    }

    #[tokio::test]
    async fn interrupted_send_does_not_block_later_sends() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Chat::new(ChatId::new("stuck"), "Stuck", Utc::now());
        JsonFileStorage::new(dir.path())
            .save(
                DEFAULT_STATE_NAMESPACE,
                &PersistedState {
                    chats: vec![chat.clone()],
                    active_chat: Some(chat),
                    active_chat_id: None,
                    is_loading: true,
                },
            )
            .unwrap();
        let settings = AppSettings {
            api_url: "http://127.0.0.1:9".to_string(),
            ..settings_in(dir.path(), StorageBackend::Json)
        };

        let desk = ChatDesk::from_settings(SettingsStore::fixed(
            settings,
            dir.path().join("settings.json"),
        ))
        .unwrap();
        assert!(!desk.store().snapshot().is_loading);

        desk.session().load_chats().await;
        let outcome = desk.session().send_message("hello").await;

        assert!(outcome.is_some());
        assert_eq!(desk.store().snapshot().active_chat().unwrap().message_count(), 2);
    }

    #[test]
    fn sqlite_backend_opens_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(&settings_in(dir.path(), StorageBackend::Sqlite)).unwrap();

        assert!(storage.load(DEFAULT_STATE_NAMESPACE).unwrap().is_none());
        assert!(dir.path().join(SQLITE_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn memory_backend_starts_empty_and_loads_demo_chats() {
        let dir = tempfile::tempdir().unwrap();
        let desk = ChatDesk::from_settings(SettingsStore::fixed(
            settings_in(dir.path(), StorageBackend::Memory),
            dir.path().join("settings.json"),
        ))
        .unwrap();
        assert!(desk.store().snapshot().chats.is_empty());

        desk.session().load_chats().await;

        let state = desk.store().snapshot();
        assert_eq!(state.chats.len(), chatdesk_client::demo_chats().len());
        assert!(state.active_chat().is_some());
    }
}
