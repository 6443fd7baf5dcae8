use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{auth::CurrentUser, db, extract::Json, offers::offer_author, AppError, AppResult, AppState};

/// The pair as stored: lower id first.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

async fn find_conversation<'e>(
    executor: impl SqliteExecutor<'e>,
    offer_id: Uuid,
    (low, high): (Uuid, Uuid),
) -> AppResult<Option<Uuid>> {
    let found: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM conversations WHERE offer_id = ? AND participant_low = ? AND participant_high = ?",
    )
    .bind(offer_id)
    .bind(low)
    .bind(high)
    .fetch_optional(executor)
    .await?;
    Ok(found.map(|(id,)| id))
}

/// Finds or creates the conversation between two users about an offer.
/// Argument order does not matter; calling it again returns the same id.
#[instrument(skip(db_pool))]
pub async fn initiate(db_pool: &SqlitePool, offer_id: Uuid, initiator_id: Uuid, recipient_id: Uuid) -> AppResult<Uuid> {
    if initiator_id == recipient_id {
        return Err(AppError::validation("Cannot start a chat with yourself"));
    }

    offer_author(db_pool, offer_id).await?;
    let recipient: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(recipient_id)
        .fetch_optional(db_pool)
        .await?;
    if recipient.is_none() {
        return Err(AppError::not_found("Recipient not found"));
    }

    let pair = ordered_pair(initiator_id, recipient_id);
    if let Some(existing) = find_conversation(db_pool, offer_id, pair).await? {
        debug!(conversation_id = %existing, "conversation reused");
        return Ok(existing);
    }

    create_conversation(db_pool, offer_id, pair).await
}

fn missing_reference(err: sqlx::Error) -> AppError {
    if db::is_foreign_key_violation(&err) {
        AppError::not_found("Offer or participant not found")
    } else {
        err.into()
    }
}

/// Inserts the conversation and both participant rows. Losing a race to a
/// concurrent insert of the same pair yields the winner's id.
async fn create_conversation(db_pool: &SqlitePool, offer_id: Uuid, pair: (Uuid, Uuid)) -> AppResult<Uuid> {
    let conversation_id = Uuid::now_v7();
    let mut tx = db_pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO conversations (id, offer_id, participant_low, participant_high, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(conversation_id)
    .bind(offer_id)
    .bind(pair.0)
    .bind(pair.1)
    .bind(db::timestamp())
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(err) if db::is_unique_violation(&err) => {
            tx.rollback().await?;
            let existing = find_conversation(db_pool, offer_id, pair).await?.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("conversation missing after duplicate insert"))
            })?;
            debug!(conversation_id = %existing, "conversation created concurrently");
            return Ok(existing);
        }
        Err(err) => return Err(missing_reference(err)),
    }

    for participant in [pair.0, pair.1] {
        sqlx::query("INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?, ?)")
            .bind(conversation_id)
            .bind(participant)
            .execute(&mut *tx)
            .await
            .map_err(missing_reference)?;
    }
    tx.commit().await?;

    info!(conversation_id = %conversation_id, "conversation created");
    Ok(conversation_id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitiateBody {
    offer_id: Uuid,
    recipient_id: Uuid,
}

#[debug_handler(state = AppState)]
pub(crate) async fn initiate_chat(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Json(InitiateBody { offer_id, recipient_id }): Json<InitiateBody>,
) -> AppResult<Json<Value>> {
    let conversation_id = initiate(&db_pool, offer_id, user.user_id, recipient_id).await?;
    Ok(Json(json!({ "conversationId": conversation_id })))
}

#[cfg(test)]
mod tests {
    use crate::{
        auth::tests::insert_user,
        offers::{create_offer, NewOffer, OfferType},
        profiles::Role,
    };

    use super::*;

    #[test]
    fn pair_order_is_canonical() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
        assert!(ordered_pair(b, a).0 < ordered_pair(b, a).1);
    }

    async fn piano_offer(db_pool: &SqlitePool) -> (Uuid, Uuid, Uuid) {
        let a = insert_user(db_pool, "a@x.test", Role::User).await;
        let b = insert_user(db_pool, "b@x.test", Role::User).await;
        let offer = NewOffer {
            title: "Move a piano".to_owned(),
            description: None,
            category_id: None,
            offer_type: OfferType::RequestForService,
        };
        let offer_id = create_offer(db_pool, a, &offer).await.unwrap();
        (offer_id, a, b)
    }

    async fn conversation_count(db_pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(db_pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn initiate_is_idempotent_in_either_direction() {
        let db_pool = db::connect_in_memory().await.unwrap();
        let (offer_id, a, b) = piano_offer(&db_pool).await;

        let first = initiate(&db_pool, offer_id, a, b).await.unwrap();
        let second = initiate(&db_pool, offer_id, b, a).await.unwrap();
        assert_eq!(first, second);

        let (participants,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = ?",
        )
        .bind(first)
        .fetch_one(&db_pool)
        .await
        .unwrap();
        assert_eq!(participants, 2);

        let own = initiate(&db_pool, offer_id, a, a).await.unwrap_err();
        assert!(matches!(own, AppError::Validation { .. }));

        let ghost = initiate(&db_pool, offer_id, a, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(ghost, AppError::NotFound(_)));

        let no_offer = initiate(&db_pool, Uuid::now_v7(), a, b).await.unwrap_err();
        assert!(matches!(no_offer, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_insert_returns_the_existing_conversation() {
        let db_pool = db::connect_in_memory().await.unwrap();
        let (offer_id, a, b) = piano_offer(&db_pool).await;

        let first = initiate(&db_pool, offer_id, a, b).await.unwrap();
        // skips the lookup, as a request that lost the race would
        let second = create_conversation(&db_pool, offer_id, ordered_pair(b, a)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(conversation_count(&db_pool).await, 1);

        let (participants,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversation_participants")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(participants, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_initiates_share_one_conversation() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let db_pool = db::connect(&format!("sqlite://{}", file.path().display())).await.unwrap();
        let (offer_id, a, b) = piano_offer(&db_pool).await;

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let db_pool = db_pool.clone();
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                tokio::spawn(async move { initiate(&db_pool, offer_id, from, to).await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        assert!(ids.iter().all(|id| *id == ids[0]), "{ids:?}");
        assert_eq!(conversation_count(&db_pool).await, 1);
        db_pool.close().await;
    }

    #[tokio::test]
    async fn deleted_initiator_is_not_found() {
        let db_pool = db::connect_in_memory().await.unwrap();
        let (offer_id, a, b) = piano_offer(&db_pool).await;
        let gone = insert_user(&db_pool, "gone@x.test", Role::User).await;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(gone)
            .execute(&db_pool)
            .await
            .unwrap();

        let err = initiate(&db_pool, offer_id, gone, b).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
        assert_eq!(conversation_count(&db_pool).await, 0);
        assert!(initiate(&db_pool, offer_id, a, b).await.is_ok());
    }
}
