mod page;
mod patch;

use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db, AppError, AppResult, AppState};

pub use patch::Patch;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(page::my_profile).patch(page::update_my_profile))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Identity joined with profile, as shown to admins and chat partners.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub years_of_experience: Option<i64>,
    pub average_rating: Option<f64>,
}

pub(crate) const USER_DETAIL_SELECT: &str = "SELECT u.id, u.email, u.role, u.created_at, p.updated_at, \
    p.first_name, p.last_name, p.phone_number, p.bio, p.years_of_experience, p.average_rating \
    FROM users u JOIN profiles p ON p.user_id = u.id";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub first_name: Patch<String>,
    #[serde(default)]
    pub last_name: Patch<Option<String>>,
    #[serde(default)]
    pub phone_number: Patch<Option<String>>,
    #[serde(default)]
    pub bio: Patch<Option<String>>,
    #[serde(default)]
    pub years_of_experience: Patch<Option<i64>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        !(self.first_name.is_set()
            || self.last_name.is_set()
            || self.phone_number.is_set()
            || self.bio.is_set()
            || self.years_of_experience.is_set())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.first_name.as_set().is_some_and(|name| name.trim().is_empty()) {
            return Err(AppError::validation("firstName cannot be empty"));
        }
        if let Some(Some(years)) = self.years_of_experience.as_set() {
            if *years < 0 {
                return Err(AppError::validation("yearsOfExperience cannot be negative"));
            }
        }
        Ok(())
    }
}

pub async fn get_user_detail(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<UserDetail> {
    sqlx::query_as::<_, UserDetail>(&format!("{USER_DETAIL_SELECT} WHERE u.id = ?"))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn list_user_details(db_pool: &SqlitePool) -> AppResult<Vec<UserDetail>> {
    Ok(
        sqlx::query_as::<_, UserDetail>(&format!(
            "{USER_DETAIL_SELECT} ORDER BY u.created_at DESC, u.rowid DESC"
        ))
        .fetch_all(db_pool)
        .await?,
    )
}

pub async fn role_of(conn: &mut SqliteConnection, user_id: Uuid) -> AppResult<Option<Role>> {
    let role: Option<(Role,)> = sqlx::query_as("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(role.map(|(role,)| role))
}

/// Writes only the fields the patch sets. A patch that sets nothing is a
/// no-op that leaves `updated_at` alone.
pub async fn apply_patch(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    patch: &ProfilePatch,
) -> AppResult<()> {
    if patch.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Sqlite>::new("UPDATE profiles SET updated_at = ");
    query.push_bind(db::timestamp());
    if let Some(first_name) = patch.first_name.as_set() {
        query.push(", first_name = ").push_bind(first_name.trim().to_owned());
    }
    if let Some(last_name) = patch.last_name.as_set() {
        query.push(", last_name = ").push_bind(last_name.clone());
    }
    if let Some(phone_number) = patch.phone_number.as_set() {
        query.push(", phone_number = ").push_bind(phone_number.clone());
    }
    if let Some(bio) = patch.bio.as_set() {
        query.push(", bio = ").push_bind(bio.clone());
    }
    if let Some(years) = patch.years_of_experience.as_set() {
        query.push(", years_of_experience = ").push_bind(*years);
    }
    query.push(" WHERE user_id = ").push_bind(user_id);

    let result = query.build().execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found"));
    }

    Ok(())
}

/// Role changes also count as an account update.
pub async fn set_role(conn: &mut SqliteConnection, user_id: Uuid, role: Role) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User not found"));
    }

    sqlx::query("UPDATE profiles SET updated_at = ? WHERE user_id = ?")
        .bind(db::timestamp())
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}
