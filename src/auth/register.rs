use axum::{debug_handler, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{db, extract::Json, profiles::Role, AppError, AppResult, AppState};

use super::Passwords;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<i64>,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

impl Registration {
    fn validate(&self) -> AppResult<()> {
        if !is_plausible_email(&self.email) {
            return Err(AppError::invalid_input("email must be a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::invalid_input(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.first_name.trim().is_empty() {
            return Err(AppError::invalid_input("firstName is required"));
        }
        if self.years_of_experience.is_some_and(|years| years < 0) {
            return Err(AppError::invalid_input("yearsOfExperience cannot be negative"));
        }
        Ok(())
    }
}

/// Inserts the user and its profile atomically. A taken email is a
/// [`AppError::Conflict`].
#[instrument(skip_all, fields(email = %registration.email))]
pub async fn create_user(
    db_pool: &SqlitePool,
    registration: &Registration,
    password_hash: &str,
    role: Role,
) -> AppResult<Uuid> {
    let user_id = Uuid::now_v7();
    let now = db::timestamp();

    let mut tx = db_pool.begin().await?;

    sqlx::query("INSERT INTO users (id, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(user_id)
        .bind(&registration.email)
        .bind(password_hash)
        .bind(role)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if db::is_unique_violation(&err) {
                AppError::conflict("User with this email already exists")
            } else {
                err.into()
            }
        })?;

    sqlx::query(
        "INSERT INTO profiles (user_id, first_name, last_name, phone_number, bio, years_of_experience, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(registration.first_name.trim())
    .bind(&registration.last_name)
    .bind(&registration.phone_number)
    .bind(&registration.bio)
    .bind(registration.years_of_experience)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(user_id = %user_id, ?role, "user registered");
    Ok(user_id)
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    State(passwords): State<Passwords>,
    Json(mut registration): Json<Registration>,
) -> AppResult<(StatusCode, Json<Value>)> {
    registration.email = normalize_email(&registration.email);
    registration.validate()?;

    let password_hash = passwords.hash(registration.password.clone()).await?;
    let user_id = create_user(&db_pool, &registration, &password_hash, Role::User).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "userId": user_id })),
    ))
}

/// Makes sure the configured super-admin account exists. An admin already
/// holding that email is kept as is. A plain user holding it is refused,
/// since anyone can register an email through the public route.
pub async fn ensure_super_admin(
    db_pool: &SqlitePool,
    passwords: &Passwords,
    email: &str,
    password: &str,
) -> AppResult<Uuid> {
    let email = normalize_email(email);

    let existing: Option<(Uuid, Role)> = sqlx::query_as("SELECT id, role FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(db_pool)
        .await?;

    match existing {
        Some((user_id, Role::Admin)) => return Ok(user_id),
        Some((user_id, _)) => {
            warn!(user_id = %user_id, "super admin email is held by a non-admin account");
            return Err(AppError::conflict(format!(
                "Super admin email {email} is already registered by a non-admin account"
            )));
        }
        None => {}
    }

    let registration = Registration {
        email,
        password: password.to_owned(),
        first_name: "Admin".to_owned(),
        last_name: None,
        phone_number: None,
        bio: None,
        years_of_experience: None,
    };
    let password_hash = passwords.hash(registration.password.clone()).await?;
    create_user(db_pool, &registration, &password_hash, Role::Admin).await
}
