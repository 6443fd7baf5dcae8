use std::time::Duration;

use anyhow::Context;

const DEV_JWT_SECRET: &str = "masterdom-local-development-secret";

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub allowed_origins: Vec<String>,
    pub super_admin_email: String,
    pub bind_addr: String,
    pub token_ttl: time::Duration,
    pub request_timeout: Duration,
    pub bcrypt_cost: u32,
    /// Seeds the super-admin account when set.
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://masterdom.db?mode=rwc".to_owned(),
            jwt_secret: DEV_JWT_SECRET.to_owned(),
            allowed_origins: vec!["http://localhost:3000".to_owned()],
            super_admin_email: "admin@gmail.com".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            token_ttl: time::Duration::hours(24),
            request_timeout: Duration::from_secs(30),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_password: None,
        }
    }
}

impl Config {
    /// Reads the environment (and `.env`, if present) on top of the local
    /// development defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = dotenv::var("DATABASE_URL") {
            config.database_url = url;
        }
        match dotenv::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => tracing::warn!("JWT_SECRET not set, using the development signing key"),
        }
        if let Ok(origins) = dotenv::var("ALLOWED_ORIGINS") {
            config.allowed_origins = parse_origins(&origins);
        }
        if let Ok(email) = dotenv::var("SUPER_ADMIN_EMAIL") {
            config.super_admin_email = email.trim().to_lowercase();
        }
        if let Ok(addr) = dotenv::var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(hours) = dotenv::var("TOKEN_TTL_HOURS") {
            let hours: i64 = hours.parse().context("TOKEN_TTL_HOURS must be an integer")?;
            config.token_ttl = time::Duration::hours(hours);
        }
        if let Ok(secs) = dotenv::var("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().context("REQUEST_TIMEOUT_SECS must be an integer")?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(cost) = dotenv::var("BCRYPT_COST") {
            config.bcrypt_cost = cost.parse().context("BCRYPT_COST must be an integer")?;
        }
        config.admin_password = dotenv::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty());

        Ok(config)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}
