use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{NewUser, User, UserCredentials, UserStore};
use crate::error::StoreError;

/// Bounds every call on the wrapped store. An elapsed call is dropped,
/// which cancels the in-flight query, and surfaces as `StoreError::Timeout`.
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: UserStore> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation = operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait]
impl<S: UserStore> UserStore for TimeoutStore<S> {
    async fn insert_user(&self, user: &NewUser) -> Result<(), StoreError> {
        self.bounded("insert_user", self.inner.insert_user(user)).await
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        self.bounded("find_credentials", self.inner.find_credentials(username))
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.bounded("find_by_id", self.inner.find_by_id(id)).await
    }

    async fn refresh_token_hash(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        self.bounded("refresh_token_hash", self.inner.refresh_token_hash(id))
            .await
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<(), StoreError> {
        self.bounded(
            "set_refresh_token_hash",
            self.inner.set_refresh_token_hash(id, hash),
        )
        .await
    }

    async fn replace_refresh_token_hash(
        &self,
        id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        self.bounded(
            "replace_refresh_token_hash",
            self.inner.replace_refresh_token_hash(id, current, new),
        )
        .await
    }
}
