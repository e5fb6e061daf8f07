use chatdesk_storage::{Chat, ChatId};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};

use super::backend::{QuestionBackend, error_details};
use super::client::{
    BoxFuture, ChatClient, ClientResult, DecodeSnafu, EmptyTitleSnafu, InvalidUrlSnafu,
    RequestSnafu, SendOutcome, StatusSnafu,
};

#[derive(Debug, Deserialize)]
struct ChatListResponse {
    chats: Vec<Chat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    chat: Chat,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    success: bool,
}

/// REST client for `/api/chats`. Unlike the mock, list/create/delete can fail.
pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    backend: QuestionBackend,
}

impl HttpChatClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            backend: QuestionBackend::new(http.clone(), base_url.clone()),
            http,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `/api/chats/{id}` with the id percent-encoded as a single path segment.
    fn chat_url(&self, chat_id: &ChatId) -> ClientResult<String> {
        let base = self.url("/api/chats");
        let mut url = reqwest::Url::parse(&base).map_err(|error| {
            InvalidUrlSnafu {
                stage: "chat-url-parse",
                url: base.clone(),
                details: error.to_string(),
            }
            .build()
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                InvalidUrlSnafu {
                    stage: "chat-url-segments",
                    url: base.clone(),
                    details: "base URL cannot carry path segments".to_string(),
                }
                .build()
            })?
            .push(chat_id.as_str());

        Ok(url.into())
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        url: String,
        stage: &'static str,
    ) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return StatusSnafu {
                stage,
                url,
                status: status.as_u16(),
                details: error_details(&details),
            }
            .fail();
        }

        response.json::<T>().await.context(DecodeSnafu { stage, url })
    }
}

impl ChatClient for HttpChatClient {
    fn name(&self) -> &str {
        "remote"
    }

    fn list_chats<'a>(&'a self) -> BoxFuture<'a, ClientResult<Vec<Chat>>> {
        Box::pin(async move {
            let url = self.url("/api/chats");
            tracing::info!(url = %url, "fetching user chats");
            let response = self.http.get(&url).send().await.context(RequestSnafu {
                stage: "list-chats-send",
                url: url.clone(),
            })?;

            let payload: ChatListResponse =
                Self::read_json(response, url, "list-chats-response").await?;
            Ok(payload.chats)
        })
    }

    fn create_chat<'a>(&'a self, title: &'a str) -> BoxFuture<'a, ClientResult<Chat>> {
        Box::pin(async move {
            ensure!(
                !title.trim().is_empty(),
                EmptyTitleSnafu {
                    stage: "create-chat-validate",
                }
            );

            let url = self.url("/api/chats");
            tracing::info!(url = %url, title, "creating new chat");
            let response = self
                .http
                .post(&url)
                .json(&serde_json::json!({ "title": title }))
                .send()
                .await
                .context(RequestSnafu {
                    stage: "create-chat-send",
                    url: url.clone(),
                })?;

            let payload: ChatResponse =
                Self::read_json(response, url, "create-chat-response").await?;
            Ok(payload.chat)
        })
    }

    fn send_message<'a>(
        &'a self,
        chat_id: &'a ChatId,
        content: &'a str,
    ) -> BoxFuture<'a, SendOutcome> {
        Box::pin(self.backend.send_message(chat_id, content))
    }

    fn delete_chat<'a>(&'a self, chat_id: &'a ChatId) -> BoxFuture<'a, ClientResult<bool>> {
        Box::pin(async move {
            let url = self.chat_url(chat_id)?;
            tracing::info!(url = %url, "deleting chat");
            let response = self.http.delete(&url).send().await.context(RequestSnafu {
                stage: "delete-chat-send",
                url: url.clone(),
            })?;

            let payload: DeleteResponse =
                Self::read_json(response, url, "delete-chat-response").await?;
            Ok(payload.success)
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{delete, get};
    use chrono::Utc;

    use super::*;
    use crate::client::ClientError;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    fn chats_router() -> Router {
        Router::new()
            .route(
                "/api/chats",
                get(|| async {
                    let chat = Chat::new(ChatId::new("remote-1"), "From server", Utc::now());
                    axum::Json(serde_json::json!({ "chats": [chat] }))
                })
                .post(
                    |axum::Json(body): axum::Json<serde_json::Value>| async move {
                        let title = body["title"].as_str().unwrap_or_default().to_string();
                        let chat = Chat::new(ChatId::new("remote-2"), title, Utc::now());
                        axum::Json(serde_json::json!({ "chat": chat }))
                    },
                ),
            )
            .route(
                "/api/chats/{id}",
                delete(|Path(id): Path<String>| async move {
                    if id == "missing" {
                        (
                            StatusCode::NOT_FOUND,
                            axum::Json(serde_json::json!({ "message": "chat not found" })),
                        )
                    } else {
                        (StatusCode::OK, axum::Json(serde_json::json!({ "success": true })))
                    }
                }),
            )
    }

    #[tokio::test]
    async fn crud_calls_decode_server_payloads() {
        let client = HttpChatClient::new(reqwest::Client::new(), spawn_backend(chats_router()).await);

        let chats = client.list_chats().await.unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].title, "From server");

        let created = client.create_chat("Planning").await.unwrap();
        assert_eq!(created.id.as_str(), "remote-2");
        assert_eq!(created.title, "Planning");

        assert!(client.delete_chat(&ChatId::new("remote-1")).await.unwrap());
    }

    #[tokio::test]
    async fn delete_of_unknown_chat_surfaces_status_and_message() {
        let client = HttpChatClient::new(reqwest::Client::new(), spawn_backend(chats_router()).await);

        let error = client.delete_chat(&ChatId::new("missing")).await.unwrap_err();
        match error {
            ClientError::Status {
                status, details, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(details, "chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn delete_keeps_reserved_characters_inside_the_id_segment() {
        let router = Router::new().route(
            "/api/chats/{id}",
            delete(|Path(id): Path<String>| async move {
                axum::Json(serde_json::json!({ "success": id == "a/b ?c#d" }))
            }),
        );
        let client = HttpChatClient::new(reqwest::Client::new(), spawn_backend(router).await);

        assert!(client.delete_chat(&ChatId::new("a/b ?c#d")).await.unwrap());
        assert_eq!(
            client.chat_url(&ChatId::new("a/b ?c#d")).unwrap(),
            format!("{}/api/chats/a%2Fb%20%3Fc%23d", client.base_url)
        );
    }

    #[tokio::test]
    async fn blank_titles_are_rejected_before_any_request() {
        let client = HttpChatClient::new(reqwest::Client::new(), "http://127.0.0.1:9");

        let error = client.create_chat("   ").await.unwrap_err();
        assert!(matches!(error, ClientError::EmptyTitle { .. }));
    }
}
