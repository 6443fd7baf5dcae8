use axum::{debug_handler, extract::State};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{auth::AdminUser, extract::Json, offers::OfferType, AppResult, AppState};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub total_offers: i64,
    pub total_service_requests: i64,
    pub total_service_offers: i64,
}

pub async fn admin_stats(db_pool: &SqlitePool) -> AppResult<AdminStats> {
    Ok(sqlx::query_as::<_, AdminStats>(
        "SELECT \
         (SELECT COUNT(*) FROM users) AS total_users, \
         (SELECT COUNT(*) FROM offers) AS total_offers, \
         (SELECT COUNT(*) FROM offers WHERE offer_type = ?) AS total_service_requests, \
         (SELECT COUNT(*) FROM offers WHERE offer_type = ?) AS total_service_offers",
    )
    .bind(OfferType::RequestForService)
    .bind(OfferType::ServiceOffer)
    .fetch_one(db_pool)
    .await?)
}

#[debug_handler(state = AppState)]
pub(crate) async fn stats(State(db_pool): State<SqlitePool>, _admin: AdminUser) -> AppResult<Json<AdminStats>> {
    Ok(Json(admin_stats(&db_pool).await?))
}
