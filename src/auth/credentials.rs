/// Credential Service
///
/// Signup, login and logout. Login answers unknown usernames and wrong
/// passwords the same way, and spends one bcrypt verification in both
/// cases so the two are not distinguishable by timing either.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use secrecy::{ExposeSecret, Secret};
use uuid::Uuid;

use crate::auth::jwt::{TokenCodec, TokenPair};
use crate::auth::password::PasswordHasher;
use crate::auth::refresh_token::issue_session;
use crate::error::{AppError, AuthError, CredentialFailure, HashError, StoreError};
use crate::store::{NewUser, User, UserStore};
use crate::validators::{is_valid_password, is_valid_username};

#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn UserStore>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    /// Verified against when the username is unknown
    dummy_hash: String,
}

impl CredentialService {
    /// # Errors
    /// Returns `HashError` if the dummy hash cannot be computed
    pub fn new(
        store: Arc<dyn UserStore>,
        codec: TokenCodec,
        hasher: PasswordHasher,
    ) -> Result<Self, HashError> {
        let filler: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let dummy_hash = hasher.hash(filler.as_bytes())?;

        Ok(Self {
            store,
            codec,
            hasher,
            dummy_hash,
        })
    }

    /// Register a new user and return its id
    ///
    /// # Errors
    /// - `ValidationError` for a malformed username or password
    /// - `StoreError::UsernameTaken` if the username exists
    /// - `HashError` / `StoreError` on collaborator failure
    pub async fn sign_up(&self, username: &str, password: Secret<String>) -> Result<Uuid, AppError> {
        let username = is_valid_username(username)?;
        is_valid_password(password.expose_secret())?;

        // The plaintext moves into the hashing task and is zeroized there.
        let password_hash = self.hasher.hash_in_background(password).await?;

        let user = NewUser {
            id: Uuid::new_v4(),
            username,
            password_hash,
        };
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");
        Ok(user.id)
    }

    /// Verify credentials and start a new session
    ///
    /// Any refresh token issued before this call stops working.
    ///
    /// # Errors
    /// - `ValidationError` for malformed input
    /// - `AuthError::BadCredentials` for an unknown user or a wrong password
    /// - `HashError` / `StoreError` on collaborator failure
    pub async fn login(&self, username: &str, password: Secret<String>) -> Result<TokenPair, AppError> {
        let username = is_valid_username(username)?;
        is_valid_password(password.expose_secret())?;

        let credentials = self.store.find_credentials(&username).await?;
        let (user_id, hash) = match credentials {
            Some(c) => (Some(c.id), c.password_hash),
            None => (None, self.dummy_hash.clone()),
        };

        let verified = self.hasher.verify_in_background(hash, password).await?;

        let user_id = match (user_id, verified) {
            (Some(id), true) => id,
            (None, _) => {
                return Err(AuthError::BadCredentials(CredentialFailure::UnknownUser).into())
            }
            (Some(_), false) => {
                return Err(AuthError::BadCredentials(CredentialFailure::WrongPassword).into())
            }
        };

        let pair = issue_session(self.store.as_ref(), &self.codec, &self.hasher, user_id).await?;

        tracing::info!(user_id = %user_id, "User logged in");
        Ok(pair)
    }

    /// End the user's session by forgetting its refresh token
    ///
    /// Access tokens already handed out stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.set_refresh_token_hash(user_id, None).await?;

        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Look up the record behind an authenticated subject
    pub async fn profile(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound.into())
    }
}
