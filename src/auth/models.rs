//! Authentication Models
//! Mission: Define account, role, and workflow envelope data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Account lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Inactive,
    Active,
    Deleted, // reserved for account management
}

impl AccountStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Deleted => "DELETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "INACTIVE" => Some(AccountStatus::Inactive),
            "ACTIVE" => Some(AccountStatus::Active),
            "DELETED" => Some(AccountStatus::Deleted),
            _ => None,
        }
    }
}

/// Role status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleStatus {
    Active,
    Inactive,
    Deleted,
}

impl RoleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RoleStatus::Active => "ACTIVE",
            RoleStatus::Inactive => "INACTIVE",
            RoleStatus::Deleted => "DELETED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(RoleStatus::Active),
            "INACTIVE" => Some(RoleStatus::Inactive),
            "DELETED" => Some(RoleStatus::Deleted),
            _ => None,
        }
    }
}

/// Shared role reference data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub status: RoleStatus,
}

impl Role {
    /// Generate a new opaque role id
    pub fn generate_id() -> String {
        format!("rol_{}", Uuid::new_v4().simple())
    }
}

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub status: AccountStatus,
    pub created_by: String,
    pub created_at: String,
    pub roles: Vec<Role>,
}

impl Account {
    /// Generate a new opaque account id
    pub fn generate_id() -> String {
        format!("usr_{}", Uuid::new_v4().simple())
    }

    /// Add a role unless one with the same id is already assigned
    pub fn assign_role(&mut self, role: Role) -> bool {
        if self.roles.iter().any(|r| r.id == role.id) {
            return false;
        }
        self.roles.push(role);
        true
    }

    pub fn role_names(&self) -> BTreeSet<String> {
        self.roles.iter().map(|r| r.name.clone()).collect()
    }
}

/// Registration request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Sign-in request body
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Public account projection (sanitized)
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: AccountStatus,
    pub created_by: String,
    pub created_at: String,
    pub roles: BTreeSet<String>,
}

impl AccountResponse {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            status: account.status,
            created_by: account.created_by.clone(),
            created_at: account.created_at.clone(),
            roles: account.role_names(),
        }
    }
}

/// Issued access/refresh pair
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user_id: String, // account email
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: usize, // seconds until the access token expires
    pub roles: BTreeSet<String>,
}

/// Message keys carried by every outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKey {
    EmailAlreadyExists,
    UserCreated,
    IncorrectPassword,
    SignedIn,
    TokensRefreshed,
    InvalidToken,
    ValidationFailed,
}

impl MessageKey {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKey::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            MessageKey::UserCreated => "USER_CREATED",
            MessageKey::IncorrectPassword => "INCORRECT_PASSWORD",
            MessageKey::SignedIn => "SIGNED_IN",
            MessageKey::TokensRefreshed => "TOKENS_REFRESHED",
            MessageKey::InvalidToken => "INVALID_TOKEN",
            MessageKey::ValidationFailed => "VALIDATION_FAILED",
        }
    }
}

/// A single failed input pre-condition
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: &'static str,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: &'static str) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

/// Envelope returned by every workflow
#[derive(Debug, Clone, Serialize)]
pub struct ServiceOutcome<T> {
    pub success: bool,
    pub message: MessageKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> ServiceOutcome<T> {
    pub fn success(message: MessageKey, data: T) -> Self {
        Self {
            success: true,
            message,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn failure(message: MessageKey) -> Self {
        Self {
            success: false,
            message,
            data: None,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            message: MessageKey::ValidationFailed,
            data: None,
            errors,
        }
    }
}

/// Token kind, carried in the `typ` claim
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (account email)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>, // access tokens only
    pub typ: TokenKind,
    pub jti: String, // unique per issuance
    pub iat: usize,
    pub exp: usize, // expiration timestamp
}
