use std::sync::Arc;

use tokio::task::spawn_blocking;

use crate::AppResult;

/// bcrypt hashing, run off the async workers.
#[derive(Clone)]
pub struct Passwords {
    cost: u32,
    // verified against when the email is unknown, so both login failures cost the same
    decoy_hash: Arc<str>,
}

impl Passwords {
    pub fn new(cost: u32) -> Result<Self, bcrypt::BcryptError> {
        let decoy_hash = bcrypt::hash("decoy-password", cost)?;
        Ok(Self {
            cost,
            decoy_hash: decoy_hash.into(),
        })
    }

    pub async fn hash(&self, password: String) -> AppResult<String> {
        let cost = self.cost;
        Ok(spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    /// `false` when `hash` is absent, after doing the same amount of work.
    pub async fn verify(&self, password: String, hash: Option<String>) -> AppResult<bool> {
        let known = hash.is_some();
        let hash = hash.unwrap_or_else(|| self.decoy_hash.to_string());

        let matches = spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        Ok(known && matches)
    }
}
