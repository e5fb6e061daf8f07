pub mod error;
pub mod file;
pub mod ids;
pub mod memory;
pub mod sqlite;
pub mod types;

use snafu::{ResultExt, ensure};

pub use error::{StorageError, StorageResult};
pub use file::JsonFileStorage;
pub use ids::{ChatId, MessageId};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use types::{
    Chat, DEFAULT_CHAT_TITLE, Message, PERSISTED_STATE_VERSION, PersistedEnvelope,
    PersistedState,
};

use error::{
    DeserializeStateSnafu, InvalidNamespaceSnafu, SerializeStateSnafu, UnsupportedVersionSnafu,
};

/// Namespace the chat state blob is stored under.
pub const DEFAULT_STATE_NAMESPACE: &str = "chatdesk-storage";

/// Durable home for one serialized state blob per namespace.
pub trait StateStorage: Send + Sync {
    fn load(&self, namespace: &str) -> StorageResult<Option<PersistedState>>;
    fn save(&self, namespace: &str, state: &PersistedState) -> StorageResult<()>;
    fn clear(&self, namespace: &str) -> StorageResult<()>;
}

pub(crate) fn validate_namespace(namespace: &str, stage: &'static str) -> StorageResult<()> {
    // Namespaces double as file names, so path separators are rejected.
    ensure!(
        !namespace.trim().is_empty()
            && namespace
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || "-_.".contains(character))
            && !namespace.starts_with('.'),
        InvalidNamespaceSnafu {
            stage,
            namespace: namespace.to_string(),
        }
    );
    Ok(())
}

pub(crate) fn encode_state(namespace: &str, state: &PersistedState) -> StorageResult<String> {
    serde_json::to_string(&PersistedEnvelope::current(state.clone())).context(
        SerializeStateSnafu {
            stage: "encode-state-envelope",
            namespace: namespace.to_string(),
        },
    )
}

pub(crate) fn decode_state(namespace: &str, payload: &str) -> StorageResult<PersistedState> {
    let envelope: PersistedEnvelope =
        serde_json::from_str(payload).context(DeserializeStateSnafu {
            stage: "decode-state-envelope",
            namespace: namespace.to_string(),
        })?;

    ensure!(
        envelope.version == PERSISTED_STATE_VERSION,
        UnsupportedVersionSnafu {
            stage: "decode-state-version",
            namespace: namespace.to_string(),
            found: envelope.version,
            expected: PERSISTED_STATE_VERSION,
        }
    );

    Ok(envelope.state)
}
