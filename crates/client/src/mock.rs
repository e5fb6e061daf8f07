use std::time::Duration;

use chatdesk_storage::{Chat, ChatId, Message, MessageId};
use chrono::{DateTime, TimeZone, Utc};

use super::backend::QuestionBackend;
use super::client::{BoxFuture, ChatClient, ClientResult, MockLatency, SendOutcome};

/// Serves canned chats for list/create/delete; sends still hit the real backend.
pub struct MockChatClient {
    backend: QuestionBackend,
    latency: MockLatency,
}

impl MockChatClient {
    pub fn new(backend: QuestionBackend, latency: MockLatency) -> Self {
        Self { backend, latency }
    }

    pub fn backend(&self) -> &QuestionBackend {
        &self.backend
    }
}

impl ChatClient for MockChatClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn list_chats<'a>(&'a self) -> BoxFuture<'a, ClientResult<Vec<Chat>>> {
        Box::pin(async move {
            tracing::info!("fetching user chats");
            simulate_latency(self.latency.list).await;
            Ok(demo_chats())
        })
    }

    fn create_chat<'a>(&'a self, title: &'a str) -> BoxFuture<'a, ClientResult<Chat>> {
        Box::pin(async move {
            tracing::info!(title, "creating new chat");
            simulate_latency(self.latency.create).await;
            Ok(Chat::new(ChatId::new_v7(), title, Utc::now()))
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
            tracing::info!(chat_id = %chat_id, "deleting chat");
            simulate_latency(self.latency.delete).await;
            Ok(true)
        })
    }
}

async fn simulate_latency(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .unwrap_or_default()
}

fn demo_chat(
    id: &str,
    title: &str,
    question: (&str, &str, DateTime<Utc>),
    answer: (&str, &str, DateTime<Utc>),
) -> Chat {
    let mut chat = Chat::new(ChatId::new(id), title, question.2);
    chat.push_message(
        Message::new(MessageId::new(question.0), question.1, true, question.2),
        question.2,
    );
    chat.push_message(
        Message::new(MessageId::new(answer.0), answer.1, false, answer.2),
        answer.2,
    );
    chat
}

/// The fixed conversations the mock list returns, newest first.
pub fn demo_chats() -> Vec<Chat> {
    vec![
        demo_chat(
            "1",
            "NIRx Product Information",
            (
                "m1",
                "What products does NIRx offer?",
                utc(2024, 1, 15, 10, 0, 0),
            ),
            (
                "m2",
                "NIRx offers cutting-edge near-infrared spectroscopy (NIRS) systems for brain imaging and neuroscience research. Our flagship products include the NIRSport2, NIRScout, and Aurora systems, each designed for different research applications and environments.",
                utc(2024, 1, 15, 10, 0, 30),
            ),
        ),
        demo_chat(
            "2",
            "Company History and Mission",
            (
                "m3",
                "Tell me about NIRx history and mission",
                utc(2024, 1, 14, 14, 30, 0),
            ),
            (
                "m4",
                "NIRx was founded with the mission to advance neuroscience research through innovative brain imaging technology. We specialize in functional near-infrared spectroscopy (fNIRS) systems that provide real-time insights into brain activity. Our commitment is to make brain imaging accessible, portable, and precise for researchers worldwide.",
                utc(2024, 1, 14, 14, 30, 45),
            ),
        ),
    ]
}
