pub mod admin;
pub mod appresult;
pub mod auth;
pub mod categories;
pub mod chats;
pub mod config;
pub mod db;
pub mod extract;
pub mod offers;
pub mod profiles;

use std::time::Duration;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use admin::SuperAdmin;
use auth::{Keys, Passwords};
use config::Config;
use extract::Json;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub keys: Keys,
    pub passwords: Passwords,
    pub super_admin: SuperAdmin,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            db_pool,
            keys: Keys::new(config.jwt_secret.as_bytes(), config.token_ttl),
            passwords: Passwords::new(config.bcrypt_cost)?,
            super_admin: SuperAdmin::new(&config.super_admin_email),
        })
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(categories::router())
        .merge(offers::router())
        .merge(profiles::router())
        .merge(chats::router())
        .merge(admin::router())
}

fn build_cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| origin.parse())
        .collect::<Result<Vec<HeaderValue>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Requests still running after `timeout` are answered with a 408.
fn request_deadline(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// The whole service: every route under `/api`, wrapped in the request
/// deadline, CORS and tracing layers.
pub fn app(state: AppState, config: &Config) -> anyhow::Result<Router> {
    Ok(Router::new()
        .nest("/api", api_routes())
        .with_state(state)
        .layer(request_deadline(config.request_timeout))
        .layer(build_cors(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http()))
}
