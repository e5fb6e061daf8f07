use chatdesk_storage::{ChatId, Message};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use super::client::{ClientResult, DecodeSnafu, RequestSnafu, SendOutcome, StatusSnafu};

/// Reply used when the backend answers without an `answer` field.
pub const NO_RESPONSE_TEXT: &str = "No response received from the AI.";

#[derive(Debug, Serialize)]
struct QuestionRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

/// Client for the question-answering endpoint, `POST {base_url}/chat`.
#[derive(Debug, Clone)]
pub struct QuestionBackend {
    http: reqwest::Client,
    base_url: String,
}

impl QuestionBackend {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat", self.base_url)
    }

    pub async fn ask(&self, question: &str) -> ClientResult<AnswerResponse> {
        let url = self.endpoint();
        let response = self
            .http
            .post(&url)
            .json(&QuestionRequest { question })
            .send()
            .await
            .context(RequestSnafu {
                stage: "ask-send",
                url: url.clone(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return StatusSnafu {
                stage: "ask-status",
                url,
                status: status.as_u16(),
                details: error_details(&details),
            }
            .fail();
        }

        response
            .json::<AnswerResponse>()
            .await
            .context(DecodeSnafu {
                stage: "ask-decode",
                url,
            })
    }

    /// Builds the user message, asks the backend, and turns whatever came back
    /// into the reply message. Never fails.
    pub async fn send_message(&self, chat_id: &ChatId, content: &str) -> SendOutcome {
        tracing::debug!(chat_id = %chat_id, "sending message to backend");
        let user_message = Message::user(content);

        let result = self.ask(content).await;
        if let Err(error) = &result {
            tracing::warn!(
                chat_id = %chat_id,
                endpoint = %self.endpoint(),
                error = %error,
                "backend call failed; replying with the error instead"
            );
        }

        SendOutcome {
            user_message,
            ai_message: Message::assistant(reply_content(result)),
        }
    }
}

/// The explicit failure-to-reply conversion for sends.
pub fn reply_content(result: ClientResult<AnswerResponse>) -> String {
    match result {
        Ok(response) => response
            .answer
            .filter(|answer| !answer.is_empty())
            .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string()),
        Err(error) => format!("Error: {error}"),
    }
}

/// Pulls a `message` or `detail` field out of an error body, else the trimmed body.
pub(crate) fn error_details(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "detail"] {
            if let Some(text) = value.get(key).and_then(serde_json::Value::as_str) {
                return text.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;

    use super::*;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{address}")
    }

    #[tokio::test]
    async fn answer_becomes_assistant_reply() {
        let router = Router::new().route(
            "/chat",
            post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                let question = body["question"].as_str().unwrap_or_default().to_string();
                axum::Json(serde_json::json!({ "answer": format!("echo: {question}") }))
            }),
        );
        let backend = QuestionBackend::new(reqwest::Client::new(), spawn_backend(router).await);

        let outcome = backend.send_message(&ChatId::new("1"), "hello").await;

        assert!(outcome.user_message.is_user);
        assert_eq!(outcome.user_message.content, "hello");
        assert!(!outcome.ai_message.is_user);
        assert_eq!(outcome.ai_message.content, "echo: hello");
        assert_ne!(outcome.user_message.id, outcome.ai_message.id);
    }

    #[tokio::test]
    async fn missing_answer_falls_back_to_fixed_text() {
        let router = Router::new().route(
            "/chat",
            post(|| async { axum::Json(serde_json::json!({ "other": 1 })) }),
        );
        let backend = QuestionBackend::new(reqwest::Client::new(), spawn_backend(router).await);

        let outcome = backend.send_message(&ChatId::new("1"), "hello").await;
        assert_eq!(outcome.ai_message.content, NO_RESPONSE_TEXT);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_in_band() {
        let router = Router::new().route(
            "/chat",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({ "detail": "qdrant down" })),
                )
            }),
        );
        let backend = QuestionBackend::new(reqwest::Client::new(), spawn_backend(router).await);

        let outcome = backend.send_message(&ChatId::new("1"), "hello").await;
        assert!(outcome.ai_message.content.starts_with("Error: "));
        assert!(outcome.ai_message.content.contains("500"));
        assert!(outcome.ai_message.content.contains("qdrant down"));
    }

    #[tokio::test]
    async fn unreachable_backend_still_resolves() {
        let backend = QuestionBackend::new(reqwest::Client::new(), unreachable_url().await);

        let outcome = backend.send_message(&ChatId::new("1"), "hello").await;

        assert_eq!(outcome.user_message.content, "hello");
        assert!(outcome.user_message.is_user);
        assert!(!outcome.ai_message.is_user);
        assert!(outcome.ai_message.content.starts_with("Error: "));
    }

    #[test]
    fn error_details_prefers_structured_fields() {
        assert_eq!(error_details(r#"{"message":"nope"}"#), "nope");
        assert_eq!(error_details("  plain  "), "plain");
        assert_eq!(error_details(""), "empty response body");
    }
}
