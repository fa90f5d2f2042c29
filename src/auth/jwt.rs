/// JWT Token Generation and Validation
///
/// `TokenCodec` owns the signing key and the token lifetimes. It is built
/// once at startup from `JwtSettings` and shared read-only afterwards.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{ConfigError, TokenError};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Access/refresh token pair as exchanged with clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from configuration
    ///
    /// # Errors
    /// Returns `ConfigError` if the secret is missing/empty or the
    /// lifetimes are inconsistent. Treat this as fatal at startup.
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        config.validate()?;

        let secret = config.secret.expose_secret().as_bytes();
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl: Duration::seconds(config.access_token_expiry),
            refresh_ttl: Duration::seconds(config.refresh_token_expiry),
        })
    }

    /// Sign a token for `subject` that expires `ttl` from now
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails
    pub fn issue(&self, subject: Uuid, ttl: Duration) -> Result<String, TokenError> {
        let claims = Claims::new(subject, ttl);

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Mint a fresh access/refresh pair for `subject`
    pub fn issue_pair(&self, subject: Uuid) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue(subject, self.access_ttl)?,
            refresh_token: self.issue(subject, self.refresh_ttl)?,
        })
    }

    /// Verify a token and extract its claims
    ///
    /// # Errors
    /// - `BadSignature` if the signature does not verify or the header
    ///   names any algorithm other than HS256
    /// - `Expired` if `exp` is not strictly in the future
    /// - `Malformed` for anything that is not a well-formed token
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation error: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::BadSignature
                    }
                    _ => TokenError::Malformed,
                }
            })?;

        // jsonwebtoken accepts exp == now; we do not.
        if claims.is_expired() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
