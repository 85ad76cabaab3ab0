//! Authentication Module
//! Mission: Register identities, verify credentials, issue and rotate session tokens

pub mod db;
pub mod errors;
pub mod jwt;
pub mod models;
pub mod password;
pub mod role_registry;
pub mod service;
pub mod user_store;

pub use errors::AuthError;
pub use jwt::TokenService;
pub use password::CredentialHasher;
pub use role_registry::{RoleRegistry, SqliteRoleRegistry};
pub use service::AuthService;
pub use user_store::{IdentityStore, SqliteIdentityStore};
