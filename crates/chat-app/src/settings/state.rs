use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chatdesk_client::{ClientConfig, ClientMode, DEFAULT_API_URL, MockLatency};
use chatdesk_storage::DEFAULT_STATE_NAMESPACE;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "chatdesk";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Environment variables with this prefix override file values, e.g. `CHATDESK_API_URL`.
pub const SETTINGS_ENV_PREFIX: &str = "CHATDESK_";
pub const DEFAULT_REPLY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub client_mode: ClientMode,
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,
    #[serde(default)]
    pub storage_backend: StorageBackend,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Pause between showing the user's message and the reply.
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
    #[serde(default = "default_mock_latency")]
    pub mock_latency: bool,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            client_mode: ClientMode::default(),
            storage_namespace: default_storage_namespace(),
            storage_backend: StorageBackend::default(),
            data_dir: None,
            reply_delay_ms: default_reply_delay_ms(),
            mock_latency: default_mock_latency(),
            request_timeout_secs: None,
        }
    }
}

impl AppSettings {
    pub fn normalized(mut self) -> Self {
        let api_url = self.api_url.trim().trim_end_matches('/');
        self.api_url = if api_url.is_empty() {
            default_api_url()
        } else {
            api_url.to_string()
        };
        self.storage_namespace = if self.storage_namespace.trim().is_empty() {
            default_storage_namespace()
        } else {
            self.storage_namespace.trim().to_string()
        };
        self.data_dir = self
            .data_dir
            .filter(|path| !path.as_os_str().is_empty());
        // Zero means "no timeout", matching the unbounded default.
        self.request_timeout_secs = self.request_timeout_secs.filter(|secs| *secs > 0);

        self
    }

    pub fn client_config(&self) -> ClientConfig {
        let latency = if self.mock_latency {
            MockLatency::default()
        } else {
            MockLatency::none()
        };
        let config = ClientConfig::new(self.api_url.clone())
            .with_mode(self.client_mode)
            .with_mock_latency(latency);

        match self.request_timeout_secs {
            Some(secs) => config.with_request_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
                .unwrap_or_else(|| PathBuf::from(".chatdesk"))
        })
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<AppSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".chatdesk"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_layers(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    /// Uses the given settings as-is, without reading files or the environment.
    pub fn fixed(settings: AppSettings, config_path: PathBuf) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings.normalized())),
            config_path,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<AppSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: AppSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    pub(crate) fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        figment.merge(Env::prefixed(SETTINGS_ENV_PREFIX))
    }

    fn load_layers(path: &Path) -> AppSettings {
        match Self::figment(path).extract::<AppSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                AppSettings::default()
            }
        }
    }

    fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_storage_namespace() -> String {
    DEFAULT_STATE_NAMESPACE.to_string()
}

fn default_reply_delay_ms() -> u64 {
    DEFAULT_REPLY_DELAY_MS
}

fn default_mock_latency() -> bool {
    true
}
