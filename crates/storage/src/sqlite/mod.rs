use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, SqliteConnection};

use super::error::{
    CreateSqliteDirectorySnafu, InvariantViolationSnafu, SqliteConnectSnafu, SqlitePragmaSnafu,
    SqliteQuerySnafu, SqliteRuntimeInitSnafu, SqliteThreadSpawnSnafu, StorageResult,
};
use super::types::PersistedState;
use super::{StateStorage, decode_state, encode_state, validate_namespace};

const CREATE_STATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_state (
    namespace TEXT PRIMARY KEY NOT NULL,
    payload TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// Keeps each namespace's blob in one row of a `kv_state` table.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    connect_options: SqliteConnectOptions,
    database_url: String,
}

impl SqliteStorage {
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        if database_location == ":memory:" || database_location.contains("mode=memory") {
            // Every call opens its own connection, so a private in-memory database
            // would vanish between calls.
            return InvariantViolationSnafu {
                stage: "sqlite-open-reject-memory",
                details: "in-memory sqlite cannot back persisted state; use MemoryStorage"
                    .to_string(),
            }
            .fail();
        }

        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(SqliteConnectSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        let storage = Self {
            connect_options,
            database_url,
        };

        let mut connection = storage.connect("sqlite-open-connect").await?;
        sqlx::query(CREATE_STATE_TABLE)
            .execute(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "sqlite-open-create-table",
            })?;

        tracing::info!(database_url = %storage.database_url, "opened sqlite state storage");
        Ok(storage)
    }

    /// Opens the database from synchronous code without requiring an ambient runtime.
    pub fn open_blocking(database_location: &str) -> StorageResult<Self> {
        let database_location = database_location.to_string();
        run_on_worker("sqlite-open", async move {
            Self::open(&database_location).await
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    async fn connect(&self, stage: &'static str) -> StorageResult<SqliteConnection> {
        let mut connection =
            self.connect_options
                .connect()
                .await
                .context(SqliteConnectSnafu {
                    stage,
                    database_url: self.database_url.clone(),
                })?;

        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&mut connection)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-store-pragma-busy-timeout",
                pragma: "busy_timeout",
            })?;

        Ok(connection)
    }
}

impl StateStorage for SqliteStorage {
    fn load(&self, namespace: &str) -> StorageResult<Option<PersistedState>> {
        validate_namespace(namespace, "sqlite-load-namespace")?;
        let storage = self.clone();
        let key = namespace.to_string();

        let payload = run_on_worker("state-load", async move {
            let mut connection = storage.connect("state-load-connect").await?;
            sqlx::query_scalar::<_, String>("SELECT payload FROM kv_state WHERE namespace = ?")
                .bind(key)
                .fetch_optional(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "state-load-select",
                })
        })?;

        payload
            .map(|payload| decode_state(namespace, &payload))
            .transpose()
    }

    fn save(&self, namespace: &str, state: &PersistedState) -> StorageResult<()> {
        validate_namespace(namespace, "sqlite-save-namespace")?;
        let payload = encode_state(namespace, state)?;
        let storage = self.clone();
        let key = namespace.to_string();

        run_on_worker("state-save", async move {
            let mut connection = storage.connect("state-save-connect").await?;
            sqlx::query(
                "INSERT INTO kv_state (namespace, payload, updated_at) VALUES (?, ?, ?) \
                 ON CONFLICT(namespace) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            )
            .bind(key)
            .bind(payload)
            .bind(unix_timestamp_seconds())
            .execute(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "state-save-upsert",
            })?;
            Ok(())
        })
    }

    fn clear(&self, namespace: &str) -> StorageResult<()> {
        validate_namespace(namespace, "sqlite-clear-namespace")?;
        let storage = self.clone();
        let key = namespace.to_string();

        run_on_worker("state-clear", async move {
            let mut connection = storage.connect("state-clear-connect").await?;
            sqlx::query("DELETE FROM kv_state WHERE namespace = ?")
                .bind(key)
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "state-clear-delete",
                })?;
            Ok(())
        })
    }
}

fn run_on_worker<T, F>(stage: &'static str, op: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: Future<Output = StorageResult<T>> + Send + 'static,
{
    // The storage trait is sync, so each call executes on a dedicated worker thread
    // with its own current-thread runtime to avoid nested-runtime blocking panics.
    let worker = std::thread::Builder::new()
        .name(format!("sqlite-state-{stage}"))
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context(SqliteRuntimeInitSnafu {
                    stage: "sqlite-state-runtime-build",
                })?;
            runtime.block_on(op)
        })
        .context(SqliteThreadSpawnSnafu {
            stage: "sqlite-state-spawn-worker",
        })?;

    match worker.join() {
        Ok(result) => result,
        Err(_) => InvariantViolationSnafu {
            stage,
            details: "sqlite storage worker thread panicked".to_string(),
        }
        .fail(),
    }
}

fn unix_timestamp_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_secs() as i64)
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateSqliteDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    format!("sqlite://{database_location}")
}
