//! Authentication Errors
//! Mission: Integrity failures that escalate instead of becoming outcomes

/// Hard failures raised by the workflows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// An identity expected to exist has no account
    AccountNotFound(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::AccountNotFound(email) => write!(f, "Account not found: {}", email),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    /// Recover an `AuthError` from an `anyhow` chain, if that is what failed
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&AuthError> {
        err.downcast_ref::<AuthError>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_not_found_survives_anyhow() {
        let err: anyhow::Error = AuthError::AccountNotFound("a@x.com".to_string()).into();
        assert_eq!(err.to_string(), "Account not found: a@x.com");
        assert_eq!(
            AuthError::from_anyhow(&err),
            Some(&AuthError::AccountNotFound("a@x.com".to_string()))
        );

        let other = anyhow::anyhow!("disk full");
        assert!(AuthError::from_anyhow(&other).is_none());
    }
}
