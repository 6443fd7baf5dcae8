use axum::{debug_handler, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::{CurrentUser, MaybeUser},
    categories, db,
    extract::{Json, Query},
    AppError, AppResult, AppState,
};

use super::OfferType;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub offer_type: OfferType,
}

/// Conjunctive filters over active offers.
#[derive(Debug, Clone, Default)]
pub struct OfferFilters {
    pub offer_type: Option<OfferType>,
    pub search: Option<String>,
    pub category_id: Option<i64>,
    /// Whose responses `has_responded` reports on.
    pub viewer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OfferListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub offer_type: OfferType,
    pub category_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_first_name: Option<String>,
    pub has_responded: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminOfferListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub offer_type: OfferType,
    pub category_id: Option<i64>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_email: String,
    pub author_first_name: Option<String>,
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Matched with `LIKE` as is, so both it and the search term are folded
/// here with full Unicode case mapping. The newline keeps a term from
/// matching across the title/description boundary.
fn search_text(title: &str, description: &str) -> String {
    format!("{title}\n{description}").to_lowercase()
}

#[instrument(skip(db_pool, offer), fields(offer_type = %offer.offer_type))]
pub async fn create_offer(db_pool: &SqlitePool, author_id: Uuid, offer: &NewOffer) -> AppResult<Uuid> {
    if offer.title.trim().is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    if let Some(category_id) = offer.category_id {
        if !categories::exists(db_pool, category_id).await? {
            return Err(AppError::invalid_input(format!("unknown category {category_id}")));
        }
    }

    let offer_id = Uuid::now_v7();
    let title = offer.title.trim();
    let description = offer.description.as_deref().unwrap_or_default();
    let now = db::timestamp();
    sqlx::query(
        "INSERT INTO offers (id, author_id, offer_type, title, description, search_text, category_id, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(offer_id)
    .bind(author_id)
    .bind(offer.offer_type)
    .bind(title)
    .bind(description)
    .bind(search_text(title, description))
    .bind(offer.category_id)
    .bind(&now)
    .bind(&now)
    .execute(db_pool)
    .await
    .map_err(|err| {
        if db::is_foreign_key_violation(&err) {
            AppError::not_found("User not found")
        } else {
            err.into()
        }
    })?;

    info!(offer_id = %offer_id, author_id = %author_id, "offer created");
    Ok(offer_id)
}

/// Active offers only, newest first.
pub async fn list_offers(db_pool: &SqlitePool, filters: &OfferFilters) -> AppResult<Vec<OfferListing>> {
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT o.id, o.title, o.description, o.offer_type, o.category_id, o.created_at, o.author_id, \
         p.first_name AS author_first_name, \
         EXISTS (SELECT 1 FROM offer_responses r WHERE r.offer_id = o.id AND r.applicant_id = ",
    );
    query.push_bind(filters.viewer_id);
    query.push(
        ") AS has_responded \
         FROM offers o LEFT JOIN profiles p ON p.user_id = o.author_id \
         WHERE o.is_active = 1",
    );

    if let Some(offer_type) = filters.offer_type {
        query.push(" AND o.offer_type = ").push_bind(offer_type);
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        query
            .push(" AND o.search_text LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'");
    }
    if let Some(category_id) = filters.category_id {
        query.push(" AND o.category_id = ").push_bind(category_id);
    }
    query.push(" ORDER BY o.created_at DESC, o.rowid DESC");

    let offers = query.build_query_as::<OfferListing>().fetch_all(db_pool).await?;
    debug!(count = offers.len(), "offers listed");
    Ok(offers)
}

/// Every offer regardless of its active flag, with author identity.
pub async fn list_admin_offers(db_pool: &SqlitePool) -> AppResult<Vec<AdminOfferListing>> {
    Ok(sqlx::query_as::<_, AdminOfferListing>(
        "SELECT o.id, o.title, o.description, o.offer_type, o.category_id, o.is_active, o.created_at, o.updated_at, \
         o.author_id, u.email AS author_email, p.first_name AS author_first_name \
         FROM offers o \
         JOIN users u ON u.id = o.author_id \
         LEFT JOIN profiles p ON p.user_id = o.author_id \
         ORDER BY o.created_at DESC, o.rowid DESC",
    )
    .fetch_all(db_pool)
    .await?)
}

pub async fn set_active(db_pool: &SqlitePool, offer_id: Uuid, is_active: bool) -> AppResult<()> {
    let result = sqlx::query("UPDATE offers SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(db::timestamp())
        .bind(offer_id)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Offer not found"));
    }

    info!(offer_id = %offer_id, is_active, "offer status changed");
    Ok(())
}

/// Responses and conversations on the offer go with it.
pub async fn delete_offer(db_pool: &SqlitePool, offer_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM offers WHERE id = ?")
        .bind(offer_id)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Offer not found"));
    }

    info!(offer_id = %offer_id, "offer deleted");
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferQuery {
    #[serde(rename = "type")]
    offer_type: Option<String>,
    search: Option<String>,
    category: Option<String>,
}

impl OfferQuery {
    fn into_filters(self, viewer_id: Option<Uuid>) -> AppResult<OfferFilters> {
        fn present(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
        }

        let offer_type = present(self.offer_type).map(|t| t.parse()).transpose()?;
        let category_id = present(self.category)
            .map(|c| {
                c.parse::<i64>()
                    .map_err(|_| AppError::invalid_input(format!("category must be an integer, got {c:?}")))
            })
            .transpose()?;

        Ok(OfferFilters {
            offer_type,
            search: present(self.search),
            category_id,
            viewer_id,
        })
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<OfferQuery>,
) -> AppResult<Json<Vec<OfferListing>>> {
    let filters = query.into_filters(viewer.map(|v| v.user_id))?;
    Ok(Json(list_offers(&db_pool, &filters).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Json(offer): Json<NewOffer>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let offer_id = create_offer(&db_pool, user.user_id, &offer).await?;
    Ok((StatusCode::CREATED, Json(json!({ "offerId": offer_id }))))
}
