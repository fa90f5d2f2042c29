/// Password Hashing and Verification
///
/// bcrypt with a fixed work factor. The salt lives inside the produced
/// hash string, so nothing else needs to be stored. The same hasher
/// protects refresh tokens: the SHA-256 digest of the token is what gets
/// hashed, so raw refresh tokens are never persisted.

use bcrypt::{hash, verify};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, HashError};

/// Work factor used unless configuration says otherwise
pub const DEFAULT_HASH_COST: u32 = 12;

const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_HASH_COST,
        }
    }
}

impl PasswordHasher {
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for a cost bcrypt does not accept
    pub fn with_cost(cost: u32) -> Result<Self, ConfigError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password hash cost must be between {} and {}, got {}",
                MIN_HASH_COST, MAX_HASH_COST, cost
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a secret
    ///
    /// # Errors
    /// Returns `HashError::Hashing` if bcrypt fails
    pub fn hash(&self, secret: &[u8]) -> Result<String, HashError> {
        hash(secret, self.cost).map_err(|e| HashError::Hashing(e.to_string()))
    }

    /// Verify a secret against a stored hash
    ///
    /// `Ok(false)` means "does not match". An error means the comparison
    /// itself could not run, e.g. the stored hash is malformed.
    pub fn verify(&self, hash: &str, secret: &[u8]) -> Result<bool, HashError> {
        verify(secret, hash).map_err(|e| HashError::Verification(e.to_string()))
    }

    /// `hash` on tokio's blocking pool. The secret is zeroized when the
    /// worker drops it.
    pub async fn hash_in_background(&self, secret: Secret<String>) -> Result<String, HashError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(secret.expose_secret().as_bytes())).await?
    }

    /// `verify` on tokio's blocking pool
    pub async fn verify_in_background(
        &self,
        hash: String,
        secret: Secret<String>,
    ) -> Result<bool, HashError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&hash, secret.expose_secret().as_bytes()))
            .await?
    }
}

/// Hex-encoded SHA-256 of a refresh token. 64 ASCII bytes, which stays
/// under bcrypt's 72 byte input limit.
pub fn refresh_token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
