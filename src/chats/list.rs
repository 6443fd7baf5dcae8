use axum::{debug_handler, extract::State};
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::CurrentUser, extract::Json, AppResult, AppState};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPreview {
    pub conversation_id: Uuid,
    pub other_participant_id: Uuid,
    pub other_participant_name: Option<String>,
    pub offer_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_content: Option<String>,
    /// Creation time of the conversation until someone writes.
    #[serde(with = "time::serde::rfc3339")]
    pub last_message_at: OffsetDateTime,
}

/// The user's conversations, most recently active first.
pub async fn list_conversations_for(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<Vec<ConversationPreview>> {
    Ok(sqlx::query_as::<_, ConversationPreview>(
        "SELECT c.id AS conversation_id, \
         other.user_id AS other_participant_id, \
         op.first_name AS other_participant_name, \
         o.title AS offer_title, \
         lm.content AS last_message_content, \
         COALESCE(lm.created_at, c.created_at) AS last_message_at \
         FROM conversation_participants me \
         JOIN conversations c ON c.id = me.conversation_id \
         JOIN conversation_participants other ON other.conversation_id = c.id AND other.user_id <> me.user_id \
         JOIN offers o ON o.id = c.offer_id \
         LEFT JOIN profiles op ON op.user_id = other.user_id \
         LEFT JOIN messages lm ON lm.id = ( \
             SELECT m.id FROM messages m WHERE m.conversation_id = c.id \
             ORDER BY m.created_at DESC, m.rowid DESC LIMIT 1) \
         WHERE me.user_id = ? \
         ORDER BY last_message_at DESC, c.rowid DESC",
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?)
}

#[debug_handler(state = AppState)]
pub(crate) async fn my_chats(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ConversationPreview>>> {
    Ok(Json(list_conversations_for(&db_pool, user.user_id).await?))
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::tests::insert_user,
        chats::{initiate, post_message},
        db,
        offers::{create_offer, NewOffer, OfferType},
        profiles::Role,
    };

    use super::*;

    #[tokio::test]
    async fn most_recently_active_first() {
        let db_pool = db::connect_in_memory().await.unwrap();
        let me = insert_user(&db_pool, "me@x.test", Role::User).await;
        let bob = insert_user(&db_pool, "bob@x.test", Role::User).await;
        let cat = insert_user(&db_pool, "cat@x.test", Role::User).await;
        let offer = NewOffer {
            title: "Garden".to_owned(),
            description: None,
            category_id: None,
            offer_type: OfferType::ServiceOffer,
        };
        let offer_id = create_offer(&db_pool, me, &offer).await.unwrap();

        let with_bob = initiate(&db_pool, offer_id, bob, me).await.unwrap();
        let with_cat = initiate(&db_pool, offer_id, cat, me).await.unwrap();

        let previews = list_conversations_for(&db_pool, me).await.unwrap();
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].conversation_id, with_cat);
        assert!(previews[0].last_message_content.is_none());

        std::thread::sleep(std::time::Duration::from_millis(5));
        post_message(&db_pool, with_bob, bob, "still there?").await.unwrap();

        let previews = list_conversations_for(&db_pool, me).await.unwrap();
        assert_eq!(previews[0].conversation_id, with_bob);
        assert_eq!(previews[0].other_participant_id, bob);
        assert_eq!(previews[0].other_participant_name.as_deref(), Some("bob"));
        assert_eq!(previews[0].last_message_content.as_deref(), Some("still there?"));
        assert!(previews.windows(2).all(|w| w[0].last_message_at >= w[1].last_message_at));

        let bobs = list_conversations_for(&db_pool, bob).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].other_participant_id, me);
    }
}
