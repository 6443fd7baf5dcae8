use axum::{debug_handler, extract::State};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    extract::{Json, Path},
    profiles::{UserDetail, USER_DETAIL_SELECT},
    AppResult, AppState,
};

use super::ensure_participant;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetails {
    pub conversation_id: Uuid,
    pub offer_id: Uuid,
    pub offer_title: String,
    pub participants: Vec<UserDetail>,
}

pub async fn conversation_details(
    db_pool: &SqlitePool,
    conversation_id: Uuid,
    requester_id: Uuid,
) -> AppResult<ConversationDetails> {
    ensure_participant(db_pool, conversation_id, requester_id).await?;

    let (offer_id, offer_title): (Uuid, String) = sqlx::query_as(
        "SELECT o.id, o.title FROM conversations c JOIN offers o ON o.id = c.offer_id WHERE c.id = ?",
    )
    .bind(conversation_id)
    .fetch_one(db_pool)
    .await?;

    let participants = sqlx::query_as::<_, UserDetail>(&format!(
        "{USER_DETAIL_SELECT} \
         JOIN conversation_participants cp ON cp.user_id = u.id \
         WHERE cp.conversation_id = ? \
         ORDER BY u.created_at, u.rowid"
    ))
    .bind(conversation_id)
    .fetch_all(db_pool)
    .await?;

    Ok(ConversationDetails {
        conversation_id,
        offer_id,
        offer_title,
        participants,
    })
}

#[debug_handler(state = AppState)]
pub(crate) async fn details(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ConversationDetails>> {
    Ok(Json(conversation_details(&db_pool, conversation_id, user.user_id).await?))
}
