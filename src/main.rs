//! Authflow CLI
//!
//! Drives the registration, sign-in, and refresh workflows against the
//! configured SQLite database and prints each outcome as JSON.
//!
//! Usage:
//!   authflow register --email a@x.com --password pw1 --first-name Ada --role ADMIN
//!   authflow sign-in --email a@x.com --password pw1
//!   authflow refresh --token <REFRESH_TOKEN>

use anyhow::Result;
use authflow::{auth::AuthError, bootstrap, config::AuthConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authflow::auth::models::{RegisterRequest, ServiceOutcome, SignInRequest};

/// How long queued welcome notifications may take to drain on exit
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "authflow")]
#[command(about = "Register accounts, sign in, and rotate session tokens")]
struct Cli {
    /// SQLite database path (overrides DATABASE_PATH)
    #[arg(long, env = "DATABASE_PATH")]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Role name; repeat for several roles
        #[arg(long = "role")]
        roles: Vec<String>,
    },

    /// Verify credentials and issue an access/refresh pair
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Exchange a refresh token for a fresh pair
    Refresh {
        #[arg(long)]
        token: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn report<T: Serialize>(outcome: &ServiceOutcome<T>) -> Result<()> {
    info!(
        message = outcome.message.as_str(),
        success = outcome.success,
        "Workflow finished"
    );
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AuthConfig::from_env()?;
    if let Some(path) = cli.db_path {
        config.database_path = path;
    }

    let (service, workers) = bootstrap(&config)?;
    let service = Arc::new(service);

    // Workflows block on bcrypt and SQLite, keep them off the async workers
    let workflow = service.clone();
    let result = tokio::task::spawn_blocking(move || match cli.command {
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
            roles,
        } => workflow
            .register(&RegisterRequest {
                email,
                password,
                first_name,
                last_name,
                roles,
            })
            .and_then(|outcome| report(&outcome)),
        Commands::SignIn { email, password } => workflow
            .sign_in(&SignInRequest { email, password })
            .and_then(|outcome| report(&outcome)),
        Commands::Refresh { token } => workflow
            .refresh(&token)
            .and_then(|outcome| report(&outcome)),
    })
    .await?;

    // Closing the queue lets workers finish whatever was dispatched
    drop(service);
    for handle in workers {
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            warn!("Notification worker did not drain in time");
        }
    }

    if let Err(e) = result {
        if let Some(auth_err) = AuthError::from_anyhow(&e) {
            error!("{}", auth_err);
            std::process::exit(2);
        }
        return Err(e);
    }

    Ok(())
}
