//! Authflow Library
//!
//! Account registration, credential verification, and access/refresh token
//! rotation. Collaborators are constructed explicitly and injected into
//! `AuthService`; see `bootstrap` for the wiring the binary uses.

pub mod auth;
pub mod config;
pub mod notify;

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::{AuthService, CredentialHasher, SqliteIdentityStore, SqliteRoleRegistry, TokenService};
use crate::config::AuthConfig;
use crate::notify::{HttpMailer, LogMailer, NotificationDispatcher, WelcomeMailer};

/// Build the orchestrator and its notification workers from configuration.
/// Must be called inside a tokio runtime.
pub fn bootstrap(config: &AuthConfig) -> Result<(AuthService, Vec<JoinHandle<()>>)> {
    let identities = Arc::new(SqliteIdentityStore::new(&config.database_path)?);
    let roles = Arc::new(SqliteRoleRegistry::new(&config.database_path)?);
    let tokens = Arc::new(TokenService::new(
        &config.jwt_secret,
        config.access_ttl(),
        config.refresh_ttl(),
    ));

    let mailer: Arc<dyn WelcomeMailer> = match &config.email_service_url {
        Some(url) => {
            let http = HttpMailer::new(url.clone(), config.email_timeout)?;
            info!("📧 Welcome emails via {}", http.endpoint());
            Arc::new(http)
        }
        None => Arc::new(LogMailer),
    };
    let (notifier, workers) =
        NotificationDispatcher::start(mailer, config.notify_queue_size, config.notify_workers);

    let hasher = CredentialHasher::new(config.bcrypt_cost);
    info!(
        "🔐 Authentication initialized at: {} (bcrypt cost {})",
        config.database_path,
        hasher.cost()
    );

    let service = AuthService::new(
        identities,
        roles,
        hasher,
        tokens,
        notifier,
        &config.service_name,
    );

    Ok((service, workers))
}
