use chatdesk::{AppError, ChatDesk};

/// Headless entry point.
///
/// With arguments, asks them as one question in a fresh chat and prints the reply.
/// Without arguments, lists the stored chats.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt::init();

    let desk = ChatDesk::bootstrap()?;
    let session = desk.session();
    session.load_chats().await;

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        let state = desk.store().snapshot();
        for chat in &state.chats {
            let marker = if state.active_chat_id.as_ref() == Some(&chat.id) {
                "*"
            } else {
                " "
            };
            println!(
                "{marker} {} ({} messages) {}",
                chat.title,
                chat.message_count(),
                chat.preview().unwrap_or("")
            );
        }
        return Ok(());
    }

    if session.new_chat().await.is_none() {
        tracing::warn!("could not create a chat for the question");
        return Ok(());
    }

    match session.send_message(&question).await {
        Some(outcome) => println!("{}", outcome.ai_message.content),
        None => tracing::warn!("question was not sent"),
    }
    Ok(())
}
