use axum::{debug_handler, extract::State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{extract::Json, profiles::Role, AppError, AppResult, AppState};

use super::{register::normalize_email, Keys, Passwords};

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub is_admin: bool,
}

/// Unknown email and wrong password are reported identically.
#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(keys): State<Keys>,
    State(passwords): State<Passwords>,
    Json(Credentials { email, password }): Json<Credentials>,
) -> AppResult<Json<LoginResponse>> {
    let email = normalize_email(&email);

    let user: Option<(Uuid, String, String, Role)> =
        sqlx::query_as("SELECT id, email, password_hash, role FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&db_pool)
            .await?;

    let (user, hash) = match user {
        Some((id, email, hash, role)) => (Some((id, email, role)), Some(hash)),
        None => (None, None),
    };

    let verified = passwords.verify(password, hash).await?;
    let Some((user_id, email, role)) = user.filter(|_| verified) else {
        info!("login rejected");
        return Err(AppError::unauthenticated("Invalid credentials"));
    };

    let is_admin = role == Role::Admin;
    let token = keys.issue(user_id, &email, is_admin)?;

    info!(user_id = %user_id, is_admin, "login succeeded");
    Ok(Json(LoginResponse { token, is_admin }))
}
