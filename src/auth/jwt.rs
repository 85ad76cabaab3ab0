//! JWT Token Service
//! Mission: Issue and validate access/refresh tokens securely

use crate::auth::models::{Claims, TokenKind};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// Stateless token issuer/validator
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Create a token service with a shared HS256 secret and explicit lifetimes
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// 30-minute access tokens, 7-day refresh tokens
    pub fn with_default_ttl(secret: &str) -> Self {
        Self::new(secret, Duration::minutes(30), Duration::hours(24 * 7))
    }

    /// Access token lifetime in seconds (0 when misconfigured as negative)
    pub fn access_expires_in(&self) -> usize {
        self.access_ttl.num_seconds().max(0) as usize
    }

    /// Issue an access token carrying the role-name set
    pub fn issue_access_token(&self, subject: &str, roles: &BTreeSet<String>) -> Result<String> {
        debug!(
            subject,
            roles = roles.len(),
            "Issuing access token, expires in {}s",
            self.access_ttl.num_seconds()
        );
        self.sign(subject, Some(roles.clone()), TokenKind::Access, self.access_ttl)
    }

    /// Issue a refresh token; roles are re-read from storage on refresh
    pub fn issue_refresh_token(&self, subject: &str) -> Result<String> {
        debug!(
            subject,
            "Issuing refresh token, expires in {}s",
            self.refresh_ttl.num_seconds()
        );
        self.sign(subject, None, TokenKind::Refresh, self.refresh_ttl)
    }

    fn sign(
        &self,
        subject: &str,
        roles: Option<BTreeSet<String>>,
        typ: TokenKind,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .context("Invalid timestamp")?
            .timestamp()
            .max(0) as usize;

        let claims = Claims {
            sub: subject.to_string(),
            roles,
            typ,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to generate JWT")
    }

    fn validation(check_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation
    }

    /// Validate signature and expiry, returning the claims
    pub fn decode_claims(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &Self::validation(true))
            .context("Invalid or expired token")?;
        Ok(decoded.claims)
    }

    /// Read the subject without checking expiry. The signature is still verified.
    pub fn subject_of(&self, token: &str) -> Result<String> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &Self::validation(false))
            .context("Malformed token")?;
        Ok(decoded.claims.sub)
    }

    pub fn validate(&self, token: &str) -> bool {
        self.decode_claims(token).is_ok()
    }

    /// `validate` plus a check of the `typ` claim
    pub fn validate_kind(&self, token: &str, kind: TokenKind) -> bool {
        matches!(self.decode_claims(token), Ok(claims) if claims.typ == kind)
    }
}
