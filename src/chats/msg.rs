use axum::{debug_handler, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    db,
    extract::{Json, Path},
    AppError, AppResult, AppState,
};

use super::ensure_participant;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_first_name: Option<String>,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_read: bool,
}

const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_id, p.first_name AS sender_first_name, \
    m.content, m.created_at, m.is_read \
    FROM messages m LEFT JOIN profiles p ON p.user_id = m.sender_id";

/// Appends a message from a participant and returns it as readers see it.
#[instrument(skip(db_pool, content))]
pub async fn post_message(
    db_pool: &SqlitePool,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
) -> AppResult<Message> {
    if content.trim().is_empty() {
        return Err(AppError::invalid_input("content is required"));
    }
    ensure_participant(db_pool, conversation_id, sender_id).await?;

    let message_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO messages (id, conversation_id, sender_id, content, is_read, created_at) VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(message_id)
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(db::timestamp())
    .execute(db_pool)
    .await?;

    debug!(message_id = %message_id, "message posted");
    Ok(sqlx::query_as::<_, Message>(&format!("{MESSAGE_SELECT} WHERE m.id = ?"))
        .bind(message_id)
        .fetch_one(db_pool)
        .await?)
}

/// Oldest first.
pub async fn list_messages(db_pool: &SqlitePool, conversation_id: Uuid, requester_id: Uuid) -> AppResult<Vec<Message>> {
    ensure_participant(db_pool, conversation_id, requester_id).await?;

    Ok(sqlx::query_as::<_, Message>(&format!(
        "{MESSAGE_SELECT} WHERE m.conversation_id = ? ORDER BY m.created_at, m.rowid"
    ))
    .bind(conversation_id)
    .fetch_all(db_pool)
    .await?)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageBody {
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(list_messages(&db_pool, conversation_id, user.user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
    Json(SendMessageBody { content }): Json<SendMessageBody>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = post_message(&db_pool, conversation_id, user.user_id, &content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
