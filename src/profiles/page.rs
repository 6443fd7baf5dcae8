use axum::{debug_handler, extract::State};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{auth::CurrentUser, extract::Json, AppResult, AppState};

use super::{apply_patch, get_user_detail, ProfilePatch, UserDetail};

#[debug_handler(state = AppState)]
pub(crate) async fn my_profile(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
) -> AppResult<Json<UserDetail>> {
    Ok(Json(get_user_detail(&db_pool, user.user_id).await?))
}

/// Any `isAdmin` key in the body is ignored here; role changes only go
/// through the admin routes.
#[debug_handler(state = AppState)]
pub(crate) async fn update_my_profile(
    State(db_pool): State<SqlitePool>,
    user: CurrentUser,
    Json(patch): Json<ProfilePatch>,
) -> AppResult<Json<Value>> {
    patch.validate()?;

    let mut tx = db_pool.begin().await?;
    apply_patch(&mut *tx, user.user_id, &patch).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.user_id, "profile updated");
    Ok(Json(json!({ "message": "Profile updated successfully" })))
}
