//! Credential Hashing
//! Mission: One-way password hashing with embedded salt

use anyhow::{bail, Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};

/// bcrypt work factor bounds
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// bcrypt only reads this many bytes of input; longer passwords are refused
pub const MAX_PASSWORD_BYTES: usize = 72;

/// bcrypt-backed password hasher
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    cost: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl CredentialHasher {
    /// Create a hasher with an explicit bcrypt work factor (4..=31)
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password; every call draws a fresh salt
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            bail!("Password exceeds {} bytes", MAX_PASSWORD_BYTES);
        }
        hash(plaintext, self.cost).context("Failed to hash password")
    }

    /// Check a plaintext password against a stored hash.
    /// Digest comparison inside bcrypt is constant-time.
    pub fn verify(&self, plaintext: &str, hash_value: &str) -> Result<bool> {
        // Would otherwise match any password sharing the first 72 bytes
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        verify(plaintext, hash_value).context("Failed to verify password")
    }
}
