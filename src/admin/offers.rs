use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    extract::{Json, Path},
    offers::{delete_offer, list_admin_offers, set_active, AdminOfferListing},
    AppError, AppResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OfferStatusBody {
    #[serde(default)]
    is_active: Option<bool>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<AdminOfferListing>>> {
    Ok(Json(list_admin_offers(&db_pool).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_status(
    State(db_pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Path(offer_id): Path<Uuid>,
    Json(body): Json<OfferStatusBody>,
) -> AppResult<Json<Value>> {
    let Some(is_active) = body.is_active else {
        return Err(AppError::validation("isActive field is required"));
    };
    set_active(&db_pool, offer_id, is_active).await?;

    tracing::info!(offer_id = %offer_id, admin_id = %admin.user_id, is_active, "offer moderated");
    Ok(Json(json!({ "message": "Offer status updated successfully" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Path(offer_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    delete_offer(&db_pool, offer_id).await?;

    tracing::info!(offer_id = %offer_id, admin_id = %admin.user_id, "offer removed by admin");
    Ok(Json(json!({ "message": "Offer deleted successfully" })))
}
