mod offers;
mod stats;
mod users;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::{categories, AppState};

pub use stats::{admin_stats, AdminStats};
pub use users::{authorize_demotion, delete_user, update_user, UserUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats::stats))
        .route("/admin/users", get(users::list))
        .route(
            "/admin/users/{id}",
            get(users::show).patch(users::update).delete(users::remove),
        )
        .route("/admin/offers", get(offers::list))
        .route("/admin/offers/{id}", patch(offers::update_status).delete(offers::remove))
        .route("/admin/categories", post(categories::create))
        .route("/admin/categories/{id}", put(categories::update).delete(categories::remove))
}

/// Email of the one admin allowed to demote other admins.
#[derive(Debug, Clone)]
pub struct SuperAdmin(pub String);

impl SuperAdmin {
    pub fn new(email: &str) -> Self {
        Self(email.trim().to_lowercase())
    }

    pub fn is(&self, email: &str) -> bool {
        self.0.eq_ignore_ascii_case(email.trim())
    }
}
