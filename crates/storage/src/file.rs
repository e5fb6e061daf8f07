use std::path::{Path, PathBuf};

use snafu::ResultExt;

use super::error::{
    CreateStorageDirectorySnafu, ReadStateFileSnafu, RemoveStateFileSnafu, RenameStateFileSnafu,
    StorageResult, WriteStateFileSnafu,
};
use super::types::PersistedState;
use super::{StateStorage, decode_state, encode_state, validate_namespace};

/// Stores each namespace as `<root>/<namespace>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("{namespace}.json"))
    }
}

impl StateStorage for JsonFileStorage {
    fn load(&self, namespace: &str) -> StorageResult<Option<PersistedState>> {
        validate_namespace(namespace, "file-load-namespace")?;
        let path = self.state_path(namespace);

        let payload = match std::fs::read_to_string(&path) {
            Ok(payload) => payload,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(source).context(ReadStateFileSnafu {
                    stage: "file-load-read",
                    path: display_path(&path),
                });
            }
        };

        decode_state(namespace, &payload).map(Some)
    }

    fn save(&self, namespace: &str, state: &PersistedState) -> StorageResult<()> {
        validate_namespace(namespace, "file-save-namespace")?;
        std::fs::create_dir_all(&self.root).context(CreateStorageDirectorySnafu {
            stage: "file-save-create-directory",
            path: display_path(&self.root),
        })?;

        let payload = encode_state(namespace, state)?;
        let path = self.state_path(namespace);
        let temp_path = path.with_extension("json.tmp");

        std::fs::write(&temp_path, payload).context(WriteStateFileSnafu {
            stage: "file-save-write-temporary",
            path: display_path(&temp_path),
        })?;
        std::fs::rename(&temp_path, &path).context(RenameStateFileSnafu {
            stage: "file-save-rename-temporary",
            from: display_path(&temp_path),
            to: display_path(&path),
        })?;

        tracing::debug!(namespace, path = %path.display(), "saved chat state");
        Ok(())
    }

    fn clear(&self, namespace: &str) -> StorageResult<()> {
        validate_namespace(namespace, "file-clear-namespace")?;
        let path = self.state_path(namespace);

        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(source).context(RemoveStateFileSnafu {
                stage: "file-clear-remove",
                path: display_path(&path),
            }),
        }
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
