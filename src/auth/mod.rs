use axum::{routing::post, Router};

use crate::AppState;

mod identity;
mod login;
mod password;
mod register;
mod token;

pub use identity::{AdminUser, CurrentUser, MaybeUser};
pub use login::LoginResponse;
pub use password::Passwords;
pub use register::{create_user, ensure_super_admin, Registration};
pub use token::{Claims, Keys};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register::register))
        .route("/auth/login", post(login::login))
}
