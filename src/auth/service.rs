//! Authentication Workflows
//! Mission: Registration, sign-in, and token refresh over injected collaborators

use crate::auth::{
    errors::AuthError,
    jwt::TokenService,
    models::{
        Account, AccountResponse, AccountStatus, FieldError, MessageKey, RegisterRequest,
        ServiceOutcome, SessionResponse, SignInRequest, TokenKind,
    },
    password::{CredentialHasher, MAX_PASSWORD_BYTES},
    role_registry::RoleRegistry,
    user_store::IdentityStore,
};
use crate::notify::NotificationDispatcher;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const EMAIL_CANT_BE_BLANK: &str = "EMAIL_CANT_BE_BLANK";
pub const PASSWORD_CANT_BE_BLANK: &str = "PASSWORD_CANT_BE_BLANK";
pub const ROLE_NAME_CANT_BE_BLANK: &str = "ROLE_NAME_CANT_BE_BLANK";
pub const TOKEN_CANT_BE_BLANK: &str = "TOKEN_CANT_BE_BLANK";
pub const PASSWORD_TOO_LONG: &str = "PASSWORD_TOO_LONG";

fn check_credentials(email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if email.trim().is_empty() {
        errors.push(FieldError::new("email", EMAIL_CANT_BE_BLANK));
    }
    if password.trim().is_empty() {
        errors.push(FieldError::new("password", PASSWORD_CANT_BE_BLANK));
    } else if password.len() > MAX_PASSWORD_BYTES {
        errors.push(FieldError::new("password", PASSWORD_TOO_LONG));
    }
    errors
}

fn check_registration(request: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = check_credentials(&request.email, &request.password);
    for (i, name) in request.roles.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(FieldError::new(format!("roles[{}]", i), ROLE_NAME_CANT_BE_BLANK));
        }
    }
    errors
}

/// Composes stores, hasher, token service and notifier into the three workflows
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    roles: Arc<dyn RoleRegistry>,
    hasher: CredentialHasher,
    tokens: Arc<TokenService>,
    notifier: NotificationDispatcher,
    service_name: String,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        roles: Arc<dyn RoleRegistry>,
        hasher: CredentialHasher,
        tokens: Arc<TokenService>,
        notifier: NotificationDispatcher,
        service_name: &str,
    ) -> Self {
        Self {
            identities,
            roles,
            hasher,
            tokens,
            notifier,
            service_name: service_name.trim().to_uppercase(),
        }
    }

    /// Register a new INACTIVE account
    pub fn register(&self, request: &RegisterRequest) -> Result<ServiceOutcome<AccountResponse>> {
        let errors = check_registration(request);
        if !errors.is_empty() {
            return Ok(ServiceOutcome::invalid(errors));
        }

        let email = request.email.trim();
        if self.identities.find_by_email(email)?.is_some() {
            info!(email, "Registration rejected, email already exists");
            return Ok(ServiceOutcome::failure(MessageKey::EmailAlreadyExists));
        }

        let mut account = Account {
            id: Account::generate_id(),
            email: email.to_string(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            password_hash: self.hasher.hash(&request.password)?,
            status: AccountStatus::Inactive,
            created_by: self.service_name.clone(),
            created_at: Utc::now().to_rfc3339(),
            roles: Vec::new(),
        };

        for name in &request.roles {
            let role = self
                .roles
                .resolve_or_create(name)
                .with_context(|| format!("Failed to resolve role {}", name))?;
            account.assign_role(role);
        }

        let saved = match self.identities.save(&account) {
            Ok(saved) => saved,
            Err(e) => {
                // Lost a race against a concurrent registration of the same email
                if self.identities.find_by_email(email)?.is_some() {
                    warn!(email, "Concurrent registration won, reporting duplicate");
                    return Ok(ServiceOutcome::failure(MessageKey::EmailAlreadyExists));
                }
                return Err(e);
            }
        };

        let display_name = saved.first_name.as_deref().unwrap_or(&saved.email);
        self.notifier.notify_welcome(&saved.email, display_name);

        info!(
            email = %saved.email,
            id = %saved.id,
            roles = saved.roles.len(),
            "Account registered"
        );

        Ok(ServiceOutcome::success(
            MessageKey::UserCreated,
            AccountResponse::from_account(&saved),
        ))
    }

    /// Verify credentials, activate the account, and issue a token pair.
    /// An unknown email is a hard `AccountNotFound` failure.
    pub fn sign_in(&self, request: &SignInRequest) -> Result<ServiceOutcome<SessionResponse>> {
        let errors = check_credentials(&request.email, &request.password);
        if !errors.is_empty() {
            return Ok(ServiceOutcome::invalid(errors));
        }

        let email = request.email.trim();
        let account = self
            .identities
            .find_by_email(email)?
            .ok_or_else(|| AuthError::AccountNotFound(email.to_string()))?;

        if !self.hasher.verify(&request.password, &account.password_hash)? {
            warn!(email, "Failed sign-in attempt");
            return Ok(ServiceOutcome::failure(MessageKey::IncorrectPassword));
        }

        if account.status == AccountStatus::Inactive {
            info!(email, "Activating account on first sign-in");
        }
        // Status-only write so roles granted since the read are kept
        let persisted = self
            .identities
            .set_status(&account.id, AccountStatus::Active)?
            .ok_or_else(|| AuthError::AccountNotFound(email.to_string()))?;

        let session = self.issue_session(&persisted.email, persisted.role_names())?;
        info!(email = %persisted.email, roles = session.roles.len(), "Sign-in successful");

        Ok(ServiceOutcome::success(MessageKey::SignedIn, session))
    }

    /// Rotate a refresh token into a fresh pair with the account's current roles
    pub fn refresh(&self, refresh_token: &str) -> Result<ServiceOutcome<SessionResponse>> {
        let token = refresh_token.trim();
        if token.is_empty() {
            return Ok(ServiceOutcome::invalid(vec![FieldError::new(
                "refresh_token",
                TOKEN_CANT_BE_BLANK,
            )]));
        }

        let subject = match self.tokens.subject_of(token) {
            Ok(subject) => subject,
            Err(e) => {
                debug!(error = %e, "Refresh token could not be decoded");
                return Ok(ServiceOutcome::failure(MessageKey::InvalidToken));
            }
        };

        let account = self
            .identities
            .find_by_email(&subject)?
            .ok_or_else(|| AuthError::AccountNotFound(subject.clone()))?;

        if !self.tokens.validate_kind(token, TokenKind::Refresh) {
            info!(email = %subject, "Refresh rejected, token expired or not a refresh token");
            return Ok(ServiceOutcome::failure(MessageKey::InvalidToken));
        }

        let session = self.issue_session(&account.email, account.role_names())?;
        debug!(email = %account.email, "Tokens refreshed");

        Ok(ServiceOutcome::success(MessageKey::TokensRefreshed, session))
    }

    fn issue_session(&self, email: &str, roles: BTreeSet<String>) -> Result<SessionResponse> {
        let access_token = self.tokens.issue_access_token(email, &roles)?;
        let refresh_token = self.tokens.issue_refresh_token(email)?;

        Ok(SessionResponse {
            user_id: email.to_string(),
            access_token,
            refresh_token,
            expires_in: self.tokens.access_expires_in(),
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        password::MIN_COST,
        role_registry::SqliteRoleRegistry,
        user_store::SqliteIdentityStore,
    };
    use crate::notify::WelcomeJob;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::NamedTempFile;
    use tokio::sync::mpsc;

    const SECRET: &str = "service-test-secret";

    struct Fixture {
        service: AuthService,
        store: Arc<SqliteIdentityStore>,
        registry: Arc<SqliteRoleRegistry>,
        tokens: Arc<TokenService>,
        welcomes: mpsc::Receiver<WelcomeJob>,
        _temp: NamedTempFile,
    }

    fn fixture_with_tokens(tokens: TokenService) -> Fixture {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_str().unwrap();
        let store = Arc::new(SqliteIdentityStore::new(path).unwrap());
        let registry = Arc::new(SqliteRoleRegistry::new(path).unwrap());
        let tokens = Arc::new(tokens);
        let (notifier, welcomes) = NotificationDispatcher::channel(16);

        let service = AuthService::new(
            store.clone(),
            registry.clone(),
            CredentialHasher::new(MIN_COST),
            tokens.clone(),
            notifier,
            "authflow",
        );

        Fixture {
            service,
            store,
            registry,
            tokens,
            welcomes,
            _temp: temp,
        }
    }

    /// Misses the first lookup, as a registration racing another would
    struct StaleLookupStore {
        inner: Arc<SqliteIdentityStore>,
        missed: AtomicBool,
    }

    impl IdentityStore for StaleLookupStore {
        fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_email(email)
        }

        fn save(&self, account: &Account) -> Result<Account> {
            self.inner.save(account)
        }

        fn set_status(&self, account_id: &str, status: AccountStatus) -> Result<Option<Account>> {
            self.inner.set_status(account_id, status)
        }
    }

    fn fixture() -> Fixture {
        fixture_with_tokens(TokenService::with_default_ttl(SECRET))
    }

    fn register_request(email: &str, password: &str, roles: &[&str]) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn sign_in_request(email: &str, password: &str) -> SignInRequest {
        SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_creates_inactive_account() {
        let mut fx = fixture();

        let outcome = fx
            .service
            .register(&register_request("a@x.com", "pw1", &["ADMIN"]))
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, MessageKey::UserCreated);

        let data = outcome.data.unwrap();
        assert_eq!(data.status, AccountStatus::Inactive);
        assert_eq!(data.created_by, "AUTHFLOW");
        assert!(data.id.starts_with("usr_"));
        assert_eq!(data.roles.len(), 1);

        let stored = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        assert_ne!(stored.password_hash, "pw1");
        assert!(CredentialHasher::default().verify("pw1", &stored.password_hash).unwrap());

        let job = fx.welcomes.try_recv().unwrap();
        assert_eq!(job.email, "a@x.com");
        assert_eq!(job.first_name, "Ada");
    }

    #[test]
    fn test_register_duplicate_email_is_soft_failure() {
        let mut fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &[]))
            .unwrap();
        let _ = fx.welcomes.try_recv();

        let outcome = fx
            .service
            .register(&register_request("A@X.com", "pw2", &["ADMIN"]))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, MessageKey::EmailAlreadyExists);
        assert!(outcome.data.is_none());
        assert_eq!(fx.store.count().unwrap(), 1);
        // No welcome for the rejected attempt, and no role created for it
        assert!(fx.welcomes.try_recv().is_err());
        assert!(fx.registry.find_by_name("ADMIN").unwrap().is_none());
    }

    #[test]
    fn test_register_dedupes_roles() {
        let fx = fixture();
        let outcome = fx
            .service
            .register(&register_request("a@x.com", "pw", &["R1", "R2", "R1", "r2"]))
            .unwrap();

        let stored = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(stored.roles.len(), 2);
        assert_eq!(outcome.data.unwrap().roles.len(), 2);
    }

    #[test]
    fn test_register_reuses_existing_roles() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw", &["ADMIN"]))
            .unwrap();
        fx.service
            .register(&register_request("b@x.com", "pw", &["admin"]))
            .unwrap();

        let a = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        let b = fx.store.find_by_email("b@x.com").unwrap().unwrap();
        assert_eq!(a.roles[0].id, b.roles[0].id);
    }

    #[test]
    fn test_register_validation_lists_fields() {
        let mut fx = fixture();
        let outcome = fx
            .service
            .register(&register_request(" ", "", &["ok", "  "]))
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, MessageKey::ValidationFailed);
        let fields: Vec<&str> = outcome.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password", "roles[1]"]);
        assert_eq!(outcome.errors[2].reason, ROLE_NAME_CANT_BE_BLANK);

        assert_eq!(fx.store.count().unwrap(), 0);
        assert!(fx.registry.find_by_name("ok").unwrap().is_none());
        assert!(fx.welcomes.try_recv().is_err());
    }

    #[test]
    fn test_sign_in_activates_and_issues_tokens() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &["ADMIN", "WRITER"]))
            .unwrap();

        let outcome = fx.service.sign_in(&sign_in_request("a@x.com", "pw1")).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, MessageKey::SignedIn);

        let session = outcome.data.unwrap();
        assert_eq!(session.user_id, "a@x.com");
        assert_eq!(session.expires_in, 30 * 60);

        let stored = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Active);

        let access = fx.tokens.decode_claims(&session.access_token).unwrap();
        assert_eq!(access.sub, "a@x.com");
        assert_eq!(access.roles, Some(stored.role_names()));
        assert_eq!(session.roles, stored.role_names());

        let refresh = fx.tokens.decode_claims(&session.refresh_token).unwrap();
        assert_eq!(refresh.typ, TokenKind::Refresh);
        assert!(refresh.roles.is_none());
    }

    #[test]
    fn test_sign_in_wrong_password_leaves_status() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &[]))
            .unwrap();

        let outcome = fx.service.sign_in(&sign_in_request("a@x.com", "wrong")).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, MessageKey::IncorrectPassword);
        assert!(outcome.data.is_none());

        let stored = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Inactive);
    }

    #[test]
    fn test_sign_in_unknown_email_is_hard_failure() {
        let fx = fixture();
        let err = fx
            .service
            .sign_in(&sign_in_request("ghost@x.com", "pw"))
            .unwrap_err();

        assert_eq!(
            AuthError::from_anyhow(&err),
            Some(&AuthError::AccountNotFound("ghost@x.com".to_string()))
        );
    }

    #[test]
    fn test_sign_in_validation() {
        let fx = fixture();
        let outcome = fx.service.sign_in(&sign_in_request("", "pw")).unwrap();
        assert_eq!(outcome.message, MessageKey::ValidationFailed);
        assert_eq!(outcome.errors, vec![FieldError::new("email", EMAIL_CANT_BE_BLANK)]);
    }

    #[test]
    fn test_refresh_reflects_current_roles() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &["ADMIN"]))
            .unwrap();
        let session = fx
            .service
            .sign_in(&sign_in_request("a@x.com", "pw1"))
            .unwrap()
            .data
            .unwrap();

        // Grant a role after sign-in
        let mut account = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        account.assign_role(fx.registry.resolve_or_create("AUDITOR").unwrap());
        fx.store.save(&account).unwrap();

        let outcome = fx.service.refresh(&session.refresh_token).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, MessageKey::TokensRefreshed);

        let refreshed = outcome.data.unwrap();
        let claims = fx.tokens.decode_claims(&refreshed.access_token).unwrap();
        let expected: BTreeSet<String> = ["ADMIN", "AUDITOR"].iter().map(|s| s.to_string()).collect();
        assert_eq!(claims.roles, Some(expected.clone()));
        assert_eq!(refreshed.roles, expected);
        assert!(fx.tokens.validate_kind(&refreshed.refresh_token, TokenKind::Refresh));
    }

    #[test]
    fn test_refresh_expired_token_is_invalid() {
        let fx = fixture_with_tokens(TokenService::new(
            SECRET,
            Duration::seconds(-120),
            Duration::seconds(-60),
        ));
        fx.service
            .register(&register_request("a@x.com", "pw1", &[]))
            .unwrap();
        let stale = fx.tokens.issue_refresh_token("a@x.com").unwrap();

        let outcome = fx.service.refresh(&stale).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, MessageKey::InvalidToken);
        assert!(outcome.data.is_none());
    }

    #[test]
    fn test_refresh_rejects_access_token() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &[]))
            .unwrap();
        let access = fx
            .tokens
            .issue_access_token("a@x.com", &BTreeSet::new())
            .unwrap();

        let outcome = fx.service.refresh(&access).unwrap();
        assert_eq!(outcome.message, MessageKey::InvalidToken);
    }

    #[test]
    fn test_refresh_unknown_subject_is_hard_failure() {
        let fx = fixture();
        let orphan = fx.tokens.issue_refresh_token("ghost@x.com").unwrap();

        let err = fx.service.refresh(&orphan).unwrap_err();
        assert!(matches!(
            AuthError::from_anyhow(&err),
            Some(AuthError::AccountNotFound(email)) if email == "ghost@x.com"
        ));
    }

    #[test]
    fn test_refresh_garbage_and_blank_tokens() {
        let fx = fixture();

        let garbage = fx.service.refresh("not-a-jwt").unwrap();
        assert_eq!(garbage.message, MessageKey::InvalidToken);

        let blank = fx.service.refresh("   ").unwrap();
        assert_eq!(blank.message, MessageKey::ValidationFailed);
        assert_eq!(blank.errors[0].reason, TOKEN_CANT_BE_BLANK);
    }

    #[test]
    fn test_register_losing_race_reports_duplicate() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &[]))
            .unwrap();

        let stale = Arc::new(StaleLookupStore {
            inner: fx.store.clone(),
            missed: AtomicBool::new(false),
        });
        let (notifier, mut welcomes) = NotificationDispatcher::channel(4);
        let racing = AuthService::new(
            stale,
            fx.registry.clone(),
            CredentialHasher::new(MIN_COST),
            fx.tokens.clone(),
            notifier,
            "authflow",
        );

        let outcome = racing
            .register(&register_request("A@x.com", "pw2", &[]))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, MessageKey::EmailAlreadyExists);
        assert_eq!(fx.store.count().unwrap(), 1);
        assert!(welcomes.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        let fx = fixture();
        let service = Arc::new(fx.service);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let service = service.clone();
                thread::spawn(move || {
                    service
                        .register(&register_request("race@x.com", &format!("pw{}", i), &[]))
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| o.success).count(), 1);
        assert!(outcomes
            .iter()
            .filter(|o| !o.success)
            .all(|o| o.message == MessageKey::EmailAlreadyExists));
        assert_eq!(fx.store.count().unwrap(), 1);
    }

    #[test]
    fn test_password_past_72_bytes_is_validation_failure() {
        let fx = fixture();
        let prefix = "a".repeat(MAX_PASSWORD_BYTES);

        let outcome = fx
            .service
            .register(&register_request("long@x.com", &format!("{}CORRECT", prefix), &[]))
            .unwrap();
        assert_eq!(outcome.message, MessageKey::ValidationFailed);
        assert_eq!(outcome.errors, vec![FieldError::new("password", PASSWORD_TOO_LONG)]);
        assert_eq!(fx.store.count().unwrap(), 0);

        // Exactly 72 bytes is accepted; a longer guess sharing that prefix is not
        assert!(fx
            .service
            .register(&register_request("a@x.com", &prefix, &[]))
            .unwrap()
            .success);
        let outcome = fx
            .service
            .sign_in(&sign_in_request("a@x.com", &format!("{}wrong", prefix)))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.errors[0].reason, PASSWORD_TOO_LONG);
        assert_eq!(
            fx.store.find_by_email("a@x.com").unwrap().unwrap().status,
            AccountStatus::Inactive
        );
        assert!(fx.service.sign_in(&sign_in_request("a@x.com", &prefix)).unwrap().success);
    }

    #[test]
    fn test_sign_in_keeps_roles_granted_concurrently() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &["ADMIN"]))
            .unwrap();

        let mut account = fx.store.find_by_email("a@x.com").unwrap().unwrap();
        account.assign_role(fx.registry.resolve_or_create("AUDITOR").unwrap());
        fx.store.save(&account).unwrap();

        let session = fx
            .service
            .sign_in(&sign_in_request("a@x.com", "pw1"))
            .unwrap()
            .data
            .unwrap();
        assert_eq!(session.roles.len(), 2);
        assert_eq!(fx.store.find_by_email("a@x.com").unwrap().unwrap().roles.len(), 2);
    }

    #[test]
    fn test_refresh_immediately_rotates_both_tokens() {
        let fx = fixture();
        fx.service
            .register(&register_request("a@x.com", "pw1", &["ADMIN"]))
            .unwrap();
        let first = fx
            .service
            .sign_in(&sign_in_request("a@x.com", "pw1"))
            .unwrap()
            .data
            .unwrap();

        let second = fx.service.refresh(&first.refresh_token).unwrap().data.unwrap();
        assert_ne!(second.access_token, first.access_token);
        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(fx.tokens.validate_kind(&second.refresh_token, TokenKind::Refresh));
    }
}
