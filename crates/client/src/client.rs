use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chatdesk_storage::{Chat, ChatId, Message};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Local development backend used when no URL is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ClientResult<T> = Result<T, ClientError>;

/// Which implementation backs list/create/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    #[default]
    Mock,
    Remote,
}

/// Artificial delays the mock client waits before resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLatency {
    pub list: Duration,
    pub create: Duration,
    pub delete: Duration,
}

impl Default for MockLatency {
    fn default() -> Self {
        Self {
            list: Duration::from_millis(800),
            create: Duration::from_millis(300),
            delete: Duration::from_millis(300),
        }
    }
}

impl MockLatency {
    pub const fn none() -> Self {
        Self {
            list: Duration::ZERO,
            create: Duration::ZERO,
            delete: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub mode: ClientMode,
    pub base_url: String,
    pub mock_latency: MockLatency,
    /// `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            mode: ClientMode::Mock,
            base_url: normalize_base_url(&base_url.into()),
            mock_latency: MockLatency::default(),
            request_timeout: None,
        }
    }

    pub fn with_mode(mut self, mode: ClientMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mock_latency(mut self, mock_latency: MockLatency) -> Self {
        self.mock_latency = mock_latency;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// The user turn and the reply produced by one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub user_message: Message,
    pub ai_message: Message,
}

/// Boundary between UI intents and the chat backend.
///
/// `send_message` has no error channel: backend failures come back as an
/// assistant message describing the failure.
pub trait ChatClient: Send + Sync {
    fn name(&self) -> &str;

    fn list_chats<'a>(&'a self) -> BoxFuture<'a, ClientResult<Vec<Chat>>>;

    fn create_chat<'a>(&'a self, title: &'a str) -> BoxFuture<'a, ClientResult<Chat>>;

    fn send_message<'a>(
        &'a self,
        chat_id: &'a ChatId,
        content: &'a str,
    ) -> BoxFuture<'a, SendOutcome>;

    fn delete_chat<'a>(&'a self, chat_id: &'a ChatId) -> BoxFuture<'a, ClientResult<bool>>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("failed to build HTTP client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to reach {url}: {source}"))]
    Request {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("HTTP error! status: {status} from {url}: {details}"))]
    Status {
        stage: &'static str,
        url: String,
        status: u16,
        details: String,
    },
    #[snafu(display("failed to decode response from {url}: {source}"))]
    Decode {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("chat title must not be empty"))]
    EmptyTitle { stage: &'static str },
    #[snafu(display("invalid request URL {url} on `{stage}`: {details}"))]
    InvalidUrl {
        stage: &'static str,
        url: String,
        details: String,
    },
}
