/// Refresh Token Rotation
///
/// Each user has at most one live refresh token. The store keeps only
/// bcrypt(hex(SHA-256(refresh token))); issuing a pair overwrites it, so
/// the previous refresh token stops verifying the moment a new one exists.
///
/// Rotation is a linear check sequence with no retryable middle state:
/// 1. decode both halves
/// 2. both halves name the same subject
/// 3. the refresh token matches the stored hash
/// 4. issue a replacement pair and swap its hash in, provided the stored
///    hash is still the one checked in step 3

use std::sync::Arc;

use secrecy::Secret;
use uuid::Uuid;

use crate::auth::jwt::{TokenCodec, TokenPair};
use crate::auth::password::{refresh_token_digest, PasswordHasher};
use crate::error::{AppError, AuthError};
use crate::store::UserStore;

/// Mint a pair and the hash that will be stored for its refresh token
async fn mint(
    codec: &TokenCodec,
    hasher: &PasswordHasher,
    user_id: Uuid,
) -> Result<(TokenPair, String), AppError> {
    let pair = codec.issue_pair(user_id)?;
    let digest = refresh_token_digest(&pair.refresh_token);
    let stored_hash = hasher.hash_in_background(Secret::new(digest)).await?;
    Ok((pair, stored_hash))
}

/// Mint a pair for `user_id` and make its refresh token the only valid one
pub(crate) async fn issue_session(
    store: &dyn UserStore,
    codec: &TokenCodec,
    hasher: &PasswordHasher,
    user_id: Uuid,
) -> Result<TokenPair, AppError> {
    let (pair, stored_hash) = mint(codec, hasher, user_id).await?;
    store
        .set_refresh_token_hash(user_id, Some(&stored_hash))
        .await?;

    Ok(pair)
}

#[derive(Clone)]
pub struct RefreshRotationManager {
    store: Arc<dyn UserStore>,
    codec: TokenCodec,
    hasher: PasswordHasher,
}

impl RefreshRotationManager {
    pub fn new(store: Arc<dyn UserStore>, codec: TokenCodec, hasher: PasswordHasher) -> Self {
        Self {
            store,
            codec,
            hasher,
        }
    }

    /// Exchange a valid pair for a new one
    ///
    /// # Errors
    /// - `AuthError::InvalidToken` if either half fails to decode or is expired
    /// - `AuthError::IdentityMismatch` if the halves name different subjects
    /// - `AuthError::StaleRefreshToken` if the refresh token is not the one
    ///   currently on record (already rotated, logged out, or never issued)
    pub async fn rotate(&self, pair: &TokenPair) -> Result<TokenPair, AppError> {
        let access = self
            .codec
            .parse(&pair.access_token)
            .map_err(AuthError::InvalidToken)?;
        let refresh = self
            .codec
            .parse(&pair.refresh_token)
            .map_err(AuthError::InvalidToken)?;

        if access.subject() != refresh.subject() {
            tracing::warn!(
                access_subject = %access.subject(),
                refresh_subject = %refresh.subject(),
                "Token pair subjects do not match"
            );
            return Err(AuthError::IdentityMismatch.into());
        }
        let user_id = refresh.subject();

        let current_hash = self.check_current(user_id, &pair.refresh_token).await?;

        let (new_pair, new_hash) = mint(&self.codec, &self.hasher, user_id).await?;
        // Only the request that still sees `current_hash` may replace it.
        let swapped = self
            .store
            .replace_refresh_token_hash(user_id, &current_hash, &new_hash)
            .await?;
        if !swapped {
            tracing::warn!(user_id = %user_id, "Refresh token was rotated concurrently");
            return Err(AuthError::StaleRefreshToken.into());
        }

        tracing::info!(user_id = %user_id, "Token pair rotated");
        Ok(new_pair)
    }

    /// Returns the stored hash the submitted refresh token matched
    async fn check_current(&self, user_id: Uuid, refresh_token: &str) -> Result<String, AppError> {
        let stored_hash = match self.store.refresh_token_hash(user_id).await? {
            Some(hash) => hash,
            None => {
                tracing::warn!(user_id = %user_id, "No refresh token on record");
                return Err(AuthError::StaleRefreshToken.into());
            }
        };

        let digest = Secret::new(refresh_token_digest(refresh_token));
        match self
            .hasher
            .verify_in_background(stored_hash.clone(), digest)
            .await
        {
            Ok(true) => Ok(stored_hash),
            Ok(false) => {
                tracing::warn!(user_id = %user_id, "Attempt to reuse a rotated refresh token");
                Err(AuthError::StaleRefreshToken.into())
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Stored refresh token hash is unusable");
                Err(AuthError::StaleRefreshToken.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::error::TokenError;
    use crate::store::{InMemoryUserStore, NewUser};
    use chrono::Duration;

    struct Fixture {
        store: Arc<InMemoryUserStore>,
        codec: TokenCodec,
        hasher: PasswordHasher,
        manager: RefreshRotationManager,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryUserStore::new());
        let codec = TokenCodec::new(&JwtSettings::new("test-secret-key-at-least-32-characters-long"))
            .unwrap();
        let hasher = PasswordHasher::with_cost(4).unwrap();
        let manager = RefreshRotationManager::new(store.clone(), codec.clone(), hasher);
        Fixture {
            store,
            codec,
            hasher,
            manager,
        }
    }

    async fn add_user(store: &InMemoryUserStore, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .insert_user(&NewUser {
                id,
                username: username.to_string(),
                password_hash: "unused".to_string(),
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_rotation_issues_new_pair() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        let p1 = issue_session(f.store.as_ref(), &f.codec, &f.hasher, user_id)
            .await
            .unwrap();

        let p2 = f.manager.rotate(&p1).await.expect("rotation should succeed");

        assert_ne!(p1.refresh_token, p2.refresh_token);
        assert_eq!(f.codec.parse(&p2.access_token).unwrap().subject(), user_id);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_stale() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        let p1 = issue_session(f.store.as_ref(), &f.codec, &f.hasher, user_id)
            .await
            .unwrap();
        let p2 = f.manager.rotate(&p1).await.unwrap();

        let replay = f.manager.rotate(&p1).await;
        assert!(matches!(replay, Err(AppError::Auth(AuthError::StaleRefreshToken))));

        assert!(f.manager.rotate(&p2).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_replay_rotates_once() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        let p1 = issue_session(f.store.as_ref(), &f.codec, &f.hasher, user_id)
            .await
            .unwrap();

        let (first, second) = tokio::join!(f.manager.rotate(&p1), f.manager.rotate(&p1));

        let winners: Vec<TokenPair> = [first, second]
            .into_iter()
            .filter_map(|result| match result {
                Ok(pair) => Some(pair),
                Err(AppError::Auth(AuthError::StaleRefreshToken)) => None,
                Err(e) => panic!("unexpected error: {}", e),
            })
            .collect();
        assert_eq!(winners.len(), 1);

        // The surviving pair is the one on record.
        assert!(f.manager.rotate(&winners[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_mixed_subjects_are_rejected() {
        let f = fixture();
        let alice = add_user(&f.store, "alice").await;
        let bob = add_user(&f.store, "bob_").await;
        let pa = issue_session(f.store.as_ref(), &f.codec, &f.hasher, alice)
            .await
            .unwrap();
        let pb = issue_session(f.store.as_ref(), &f.codec, &f.hasher, bob)
            .await
            .unwrap();

        let mixed = TokenPair {
            access_token: pa.access_token,
            refresh_token: pb.refresh_token,
        };
        let result = f.manager.rotate(&mixed).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::IdentityMismatch))));
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_invalid() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        let pair = TokenPair {
            access_token: f.codec.issue(user_id, Duration::minutes(15)).unwrap(),
            refresh_token: f.codec.issue(user_id, Duration::seconds(-60)).unwrap(),
        };

        let result = f.manager.rotate(&pair).await;
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidToken(TokenError::Expired)))
        ));
    }

    #[tokio::test]
    async fn test_expired_access_token_is_invalid() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        let session = issue_session(f.store.as_ref(), &f.codec, &f.hasher, user_id)
            .await
            .unwrap();
        let pair = TokenPair {
            access_token: f.codec.issue(user_id, Duration::seconds(-60)).unwrap(),
            refresh_token: session.refresh_token,
        };

        let result = f.manager.rotate(&pair).await;
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidToken(TokenError::Expired)))
        ));
    }

    #[tokio::test]
    async fn test_refresh_without_session_is_stale() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        // Validly signed but never recorded by login
        let pair = f.codec.issue_pair(user_id).unwrap();

        let result = f.manager.rotate(&pair).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::StaleRefreshToken))));
    }

    #[tokio::test]
    async fn test_unusable_stored_hash_is_stale() {
        let f = fixture();
        let user_id = add_user(&f.store, "alice").await;
        let pair = f.codec.issue_pair(user_id).unwrap();
        f.store
            .set_refresh_token_hash(user_id, Some("garbage"))
            .await
            .unwrap();

        let result = f.manager.rotate(&pair).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::StaleRefreshToken))));
    }

    #[tokio::test]
    async fn test_garbage_tokens_are_invalid() {
        let f = fixture();
        let pair = TokenPair {
            access_token: "not-a-token".to_string(),
            refresh_token: "also-not".to_string(),
        };

        let result = f.manager.rotate(&pair).await;
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidToken(TokenError::Malformed)))
        ));
    }
}
