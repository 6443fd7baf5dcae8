use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{db, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub exp: i64,
}

/// HMAC signing key, fixed for the lifetime of the process.
#[derive(Clone)]
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: time::Duration,
}

impl Keys {
    pub fn new(secret: &[u8], ttl: time::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, is_admin: bool) -> AppResult<String> {
        let claims = Claims {
            user_id,
            email: email.to_owned(),
            is_admin,
            exp: (db::now() + self.ttl).unix_timestamp(),
        };

        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let keys = Keys::new(b"secret", time::Duration::hours(1));
        let user_id = Uuid::now_v7();

        let token = keys.issue(user_id, "a@b.test", true).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "a@b.test");
        assert!(claims.is_admin);
    }

    #[test]
    fn rejects_foreign_signature() {
        let ours = Keys::new(b"secret", time::Duration::hours(1));
        let theirs = Keys::new(b"other", time::Duration::hours(1));

        let token = theirs.issue(Uuid::now_v7(), "a@b.test", true).unwrap();
        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let keys = Keys::new(b"secret", time::Duration::hours(-2));

        let token = keys.issue(Uuid::now_v7(), "a@b.test", false).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let keys = Keys::new(b"secret", time::Duration::hours(1));
        assert!(keys.verify("not.a.token").is_err());
    }
}
