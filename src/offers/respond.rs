use axum::{debug_handler, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    db,
    extract::{Json, Path},
    AppError, AppResult, AppState,
};

use super::offer_author;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub applicant_id: Uuid,
    pub message: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub applicant_first_name: Option<String>,
    pub applicant_rating: Option<f64>,
}

/// One response per applicant per offer, held by the unique index on
/// `offer_responses`.
#[instrument(skip(db_pool, message))]
pub async fn respond(db_pool: &SqlitePool, offer_id: Uuid, applicant_id: Uuid, message: &str) -> AppResult<Uuid> {
    let author_id = offer_author(db_pool, offer_id).await?;
    if author_id == applicant_id {
        return Err(AppError::validation("You cannot respond to your own offer"));
    }

    let response_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO offer_responses (id, offer_id, applicant_id, message, status, created_at) \
         VALUES (?, ?, ?, ?, 'pending', ?)",
    )
    .bind(response_id)
    .bind(offer_id)
    .bind(applicant_id)
    .bind(message)
    .bind(db::timestamp())
    .execute(db_pool)
    .await
    .map_err(|err| {
        if db::is_unique_violation(&err) {
            AppError::conflict("You have already responded to this offer")
        } else if db::is_foreign_key_violation(&err) {
            AppError::not_found("Offer or applicant not found")
        } else {
            err.into()
        }
    })?;

    info!(response_id = %response_id, "response recorded");
    Ok(response_id)
}

/// Responses to an offer, newest first. Only its author may look.
pub async fn list_applications(db_pool: &SqlitePool, offer_id: Uuid, requester_id: Uuid) -> AppResult<Vec<Application>> {
    let author_id = offer_author(db_pool, offer_id).await?;
    if author_id != requester_id {
        warn!(offer_id = %offer_id, requester_id = %requester_id, "applications refused");
        return Err(AppError::forbidden(
            "You are not authorized to view applications for this offer",
        ));
    }

    Ok(sqlx::query_as::<_, Application>(
        "SELECT r.id, r.offer_id, r.applicant_id, r.message, r.status, r.created_at, \
         p.first_name AS applicant_first_name, p.average_rating AS applicant_rating \
         FROM offer_responses r \
         LEFT JOIN profiles p ON p.user_id = r.applicant_id \
         WHERE r.offer_id = ? \
         ORDER BY r.created_at DESC, r.rowid DESC",
    )
    .bind(offer_id)
    .fetch_all(db_pool)
    .await?)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RespondBody {
    #[serde(default)]
    message: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn respond_to_offer(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Path(offer_id): Path<Uuid>,
    Json(RespondBody { message }): Json<RespondBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let response_id = respond(&db_pool, offer_id, user.user_id, message.as_deref().unwrap_or_default()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Response submitted successfully", "responseId": response_id })),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn applications(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Path(offer_id): Path<Uuid>,
) -> AppResult<Json<Vec<Application>>> {
    Ok(Json(list_applications(&db_pool, offer_id, user.user_id).await?))
}
