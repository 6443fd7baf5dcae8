use axum::{debug_handler, extract::State, http::StatusCode, routing::get, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::{
    auth::AdminUser,
    db,
    extract::{Json, Path},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/categories", get(list))
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryPayload {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::invalid_input("name is required"));
        }
        Ok(())
    }
}

fn map_duplicate(err: sqlx::Error) -> AppError {
    if db::is_unique_violation(&err) {
        AppError::conflict("Category with this name already exists")
    } else {
        err.into()
    }
}

pub async fn list_categories(db_pool: &SqlitePool) -> AppResult<Vec<Category>> {
    Ok(
        sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories ORDER BY name")
            .fetch_all(db_pool)
            .await?,
    )
}

pub async fn exists<'e>(executor: impl SqliteExecutor<'e>, id: i64) -> AppResult<bool> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub async fn create_category(db_pool: &SqlitePool, payload: &CategoryPayload) -> AppResult<i64> {
    let result = sqlx::query("INSERT INTO categories (name, description) VALUES (?, ?)")
        .bind(payload.name.trim())
        .bind(&payload.description)
        .execute(db_pool)
        .await
        .map_err(map_duplicate)?;
    Ok(result.last_insert_rowid())
}

pub async fn update_category(db_pool: &SqlitePool, id: i64, payload: &CategoryPayload) -> AppResult<()> {
    let result = sqlx::query("UPDATE categories SET name = ?, description = ? WHERE id = ?")
        .bind(payload.name.trim())
        .bind(&payload.description)
        .bind(id)
        .execute(db_pool)
        .await
        .map_err(map_duplicate)?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Category not found"));
    }
    Ok(())
}

/// Offers in the category keep existing with no category.
pub async fn delete_category(db_pool: &SqlitePool, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Category not found"));
    }
    Ok(())
}

#[debug_handler]
pub(crate) async fn list(State(db_pool): State<SqlitePool>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(list_categories(&db_pool).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CategoryPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    payload.validate()?;
    let category_id = create_category(&db_pool, &payload).await?;

    tracing::info!(category_id, admin_id = %admin.user_id, "category created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Category created successfully", "categoryId": category_id })),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryPayload>,
) -> AppResult<Json<Value>> {
    payload.validate()?;
    update_category(&db_pool, id, &payload).await?;

    tracing::info!(category_id = id, admin_id = %admin.user_id, "category updated");
    Ok(Json(json!({ "message": "Category updated successfully" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    delete_category(&db_pool, id).await?;

    tracing::info!(category_id = id, admin_id = %admin.user_id, "category deleted");
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
