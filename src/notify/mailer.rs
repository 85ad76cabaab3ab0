//! Welcome mail delivery seam.
//!
//! The dispatcher only knows this trait. Template rendering and the actual
//! mail protocol live behind whatever service `HttpMailer` talks to.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[async_trait::async_trait]
pub trait WelcomeMailer: Send + Sync {
    async fn send_welcome(&self, email: &str, first_name: &str) -> Result<()>;
}

/// Logs instead of sending. Used when no email service is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl WelcomeMailer for LogMailer {
    async fn send_welcome(&self, email: &str, first_name: &str) -> Result<()> {
        info!(email, first_name, "Welcome notification (log only)");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WelcomePayload<'a> {
    email: &'a str,
    first_name: &'a str,
}

/// POSTs the welcome request as JSON to an external email service
#[derive(Clone)]
pub struct HttpMailer {
    http: Client,
    endpoint: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("authflow/0.1 (welcome mailer)")
            .build()
            .context("Failed to build mailer HTTP client")?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl WelcomeMailer for HttpMailer {
    async fn send_welcome(&self, email: &str, first_name: &str) -> Result<()> {
        self.http
            .post(&self.endpoint)
            .json(&WelcomePayload { email, first_name })
            .send()
            .await
            .context("Email service unreachable")?
            .error_for_status()
            .context("Email service rejected welcome request")?;

        info!(email, "Welcome notification sent");
        Ok(())
    }
}
