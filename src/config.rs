//! Runtime configuration loaded from the environment (and `.env`)

use anyhow::Result;
use std::env;
use std::time::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub database_path: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    /// Creator tag stamped on new accounts (upper-cased)
    pub service_name: String,
    pub email_service_url: Option<String>,
    pub email_timeout: Duration,
    pub notify_queue_size: usize,
    pub notify_workers: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            database_path: "./authflow.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_ttl_minutes: 30,
            refresh_token_ttl_hours: 24 * 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            service_name: "AUTHFLOW".to_string(),
            email_service_url: None,
            email_timeout: Duration::from_secs(5),
            notify_queue_size: 256,
            notify_workers: 2,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, using development secret");
                defaults.jwt_secret
            }
        };

        let email_service_url = env::var("EMAIL_SERVICE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            jwt_secret,
            access_token_ttl_minutes: parse_var("ACCESS_TOKEN_TTL_MINUTES")
                .filter(|&v: &i64| v > 0)
                .unwrap_or(defaults.access_token_ttl_minutes),
            refresh_token_ttl_hours: parse_var("REFRESH_TOKEN_TTL_HOURS")
                .filter(|&v: &i64| v > 0)
                .unwrap_or(defaults.refresh_token_ttl_hours),
            bcrypt_cost: parse_var("BCRYPT_COST").unwrap_or(defaults.bcrypt_cost),
            service_name: env::var("SERVICE_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.service_name)
                .trim()
                .to_uppercase(),
            email_service_url,
            email_timeout: parse_var("EMAIL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.email_timeout),
            notify_queue_size: parse_var("NOTIFY_QUEUE_SIZE")
                .filter(|&v: &usize| v > 0)
                .unwrap_or(defaults.notify_queue_size),
            notify_workers: parse_var("NOTIFY_WORKERS")
                .filter(|&v: &usize| v > 0)
                .unwrap_or(defaults.notify_workers),
        })
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.refresh_token_ttl_hours)
    }
}
