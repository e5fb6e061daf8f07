use std::sync::Arc;

use snafu::ResultExt;

mod backend;
mod client;
mod mock;
mod remote;

pub use backend::{AnswerResponse, NO_RESPONSE_TEXT, QuestionBackend, reply_content};
pub use client::{
    BoxFuture, ChatClient, ClientConfig, ClientError, ClientMode, ClientResult, DEFAULT_API_URL,
    MockLatency, SendOutcome,
};
pub use mock::{MockChatClient, demo_chats};
pub use remote::HttpChatClient;

use client::BuildHttpClientSnafu;

pub fn create_client(config: ClientConfig) -> ClientResult<Arc<dyn ChatClient>> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    let http = builder.build().context(BuildHttpClientSnafu {
        stage: "create-client",
    })?;

    tracing::info!(mode = ?config.mode, base_url = %config.base_url, "creating chat client");

    match config.mode {
        ClientMode::Mock => Ok(Arc::new(MockChatClient::new(
            QuestionBackend::new(http, config.base_url),
            config.mock_latency,
        ))),
        ClientMode::Remote => Ok(Arc::new(HttpChatClient::new(http, config.base_url))),
    }
}
