/// JWT Claims structure
///
/// Payload carried by both halves of a token pair. The subject identity is
/// an explicit field so either token can be decoded on its own without a
/// session lookup.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject identity (user id)
    pub id: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Unique token id, keeps two tokens minted in the same second distinct
    pub jti: Uuid,
}

impl Claims {
    /// Create new claims for `subject` expiring `ttl` from now
    pub fn new(subject: Uuid, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: subject,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    pub fn subject(&self) -> Uuid {
        self.id
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// A token is expired once `exp` is no longer strictly in the future.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Duration::minutes(15));

        assert_eq!(claims.subject(), user_id);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        let claims = Claims::new(Uuid::new_v4(), Duration::minutes(1));
        let at_expiry = claims.expires_at().unwrap();

        assert!(claims.is_expired_at(at_expiry));
        assert!(!claims.is_expired_at(at_expiry - Duration::seconds(1)));
    }

    #[test]
    fn test_negative_ttl_is_expired() {
        let claims = Claims::new(Uuid::new_v4(), Duration::seconds(-10));
        assert!(claims.is_expired());
    }

    #[test]
    fn test_each_claims_gets_unique_jti() {
        let user_id = Uuid::new_v4();
        let a = Claims::new(user_id, Duration::hours(72));
        let b = Claims::new(user_id, Duration::hours(72));

        assert_ne!(a.jti, b.jti);
    }
}
