use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    extract::{Json, Path},
    profiles::{apply_patch, get_user_detail, list_user_details, role_of, set_role, ProfilePatch, Role, UserDetail},
    AppError, AppResult, AppState,
};

use super::SuperAdmin;

/// Profile fields plus an optional role change.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(flatten)]
    pub profile: ProfilePatch,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

/// Only the super-admin may demote another admin. Nobody may demote
/// themself.
pub fn authorize_demotion(
    actor_id: Uuid,
    actor_is_super_admin: bool,
    target_id: Uuid,
    target_role: Role,
) -> AppResult<()> {
    if actor_id == target_id {
        return Err(AppError::forbidden("Cannot remove admin rights from yourself"));
    }
    if !actor_is_super_admin && target_role == Role::Admin {
        return Err(AppError::forbidden(
            "Forbidden: Only the super admin can demote other administrators",
        ));
    }
    Ok(())
}

/// Applies the profile patch and any role change atomically. The actor's
/// super-admin status is read from the stored email, not the token.
#[instrument(skip(db_pool, super_admin, update))]
pub async fn update_user(
    db_pool: &SqlitePool,
    super_admin: &SuperAdmin,
    actor_id: Uuid,
    target_id: Uuid,
    update: &UserUpdate,
) -> AppResult<()> {
    update.profile.validate()?;

    let mut tx = db_pool.begin().await?;
    let Some(target_role) = role_of(&mut *tx, target_id).await? else {
        return Err(AppError::not_found("User not found"));
    };

    let new_role = match update.is_admin {
        Some(true) => Some(Role::Admin),
        Some(false) => {
            let actor_email: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = ?")
                .bind(actor_id)
                .fetch_optional(&mut *tx)
                .await?;
            let actor_is_super_admin = actor_email.is_some_and(|(email,)| super_admin.is(&email));

            if let Err(err) = authorize_demotion(actor_id, actor_is_super_admin, target_id, target_role) {
                warn!(actor_id = %actor_id, target_id = %target_id, "demotion refused");
                return Err(err);
            }
            Some(Role::User)
        }
        None => None,
    };

    apply_patch(&mut *tx, target_id, &update.profile).await?;
    if let Some(role) = new_role.filter(|role| *role != target_role) {
        set_role(&mut *tx, target_id, role).await?;
        info!(actor_id = %actor_id, target_id = %target_id, role = ?role, "role changed");
    }
    tx.commit().await?;

    Ok(())
}

/// Admins cannot be deleted. Everything the user owns goes with them.
pub async fn delete_user(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ? AND role <> ?")
        .bind(user_id)
        .bind(Role::Admin)
        .execute(db_pool)
        .await?;
    if result.rows_affected() > 0 {
        return Ok(());
    }

    let mut conn = db_pool.acquire().await?;
    match role_of(&mut conn, user_id).await? {
        Some(_) => Err(AppError::forbidden("Cannot delete an administrator")),
        None => Err(AppError::not_found("User not found")),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(State(db_pool): State<SqlitePool>, _admin: AdminUser) -> AppResult<Json<Vec<UserDetail>>> {
    Ok(Json(list_user_details(&db_pool).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn show(
    State(db_pool): State<SqlitePool>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserDetail>> {
    Ok(Json(get_user_detail(&db_pool, user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    State(super_admin): State<SuperAdmin>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
    Json(update): Json<UserUpdate>,
) -> AppResult<Json<Value>> {
    update_user(&db_pool, &super_admin, admin.user_id, user_id, &update).await?;
    Ok(Json(json!({ "message": "User updated successfully" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    delete_user(&db_pool, user_id).await?;

    info!(user_id = %user_id, admin_id = %admin.user_id, "user deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
