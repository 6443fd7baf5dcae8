use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::Keys;

/// The caller, as proven by a valid bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

/// A [`CurrentUser`] whose token carries the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

/// Present when a valid token was sent, absent when no `Authorization`
/// header was sent at all. A bad token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

fn authenticate(parts: &Parts, keys: &Keys) -> AppResult<CurrentUser> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Err(AppError::unauthenticated("Authorization header is missing"));
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthenticated("Invalid authorization header format"))?;

    let claims = keys.verify(token).map_err(|err| {
        tracing::debug!(error = %err, "token rejected");
        AppError::unauthenticated("Invalid or expired token")
    })?;

    Ok(CurrentUser {
        user_id: claims.user_id,
        email: claims.email,
        is_admin: claims.is_admin,
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Keys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts, &Keys::from_ref(state))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    Keys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, &Keys::from_ref(state))?;
        if !user.is_admin {
            tracing::warn!(user_id = %user.user_id, "admin route refused");
            return Err(AppError::forbidden("Forbidden: Admin access required"));
        }

        Ok(AdminUser(user))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    Keys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeUser(None));
        }

        authenticate(parts, &Keys::from_ref(state)).map(|user| MaybeUser(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_bearer_token() {
        let keys = Keys::new(b"secret", time::Duration::hours(1));
        let user_id = Uuid::now_v7();
        let token = keys.issue(user_id, "a@b.test", false).unwrap();

        let user = authenticate(&parts_with(Some(&format!("Bearer {token}"))), &keys).unwrap();
        assert_eq!(user.user_id, user_id);
        assert!(!user.is_admin);
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        let keys = Keys::new(b"secret", time::Duration::hours(1));

        for header in [None, Some("Token abc"), Some("Bearer nope")] {
            let err = authenticate(&parts_with(header), &keys).unwrap_err();
            assert!(matches!(err, AppError::Unauthenticated(_)), "{header:?}");
        }
    }
}
