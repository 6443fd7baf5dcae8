mod details;
mod initiate;
mod list;
mod msg;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

pub use details::{conversation_details, ConversationDetails};
pub use initiate::{initiate, ordered_pair};
pub use list::{list_conversations_for, ConversationPreview};
pub use msg::{list_messages, post_message, Message};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chats", get(list::my_chats))
        .route("/chats/initiate", post(initiate::initiate_chat))
        .route("/chats/{id}", get(details::details))
        .route("/chats/{id}/messages", get(msg::messages).post(msg::send))
}

/// An unknown conversation looks the same as someone else's.
pub async fn ensure_participant<'e>(
    executor: impl SqliteExecutor<'e>,
    conversation_id: Uuid,
    user_id: Uuid,
) -> AppResult<()> {
    let found: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND user_id = ?",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    match found {
        Some(_) => Ok(()),
        None => {
            tracing::warn!(conversation_id = %conversation_id, user_id = %user_id, "conversation access refused");
            Err(AppError::forbidden("Forbidden"))
        }
    }
}
