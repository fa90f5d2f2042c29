use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{NewUser, User, UserCredentials, UserStore};
use crate::error::StoreError;

/// Process-local store. Used with `application.store = "memory"` and by tests.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Backend("user map lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert_user(&self, user: &NewUser) -> Result<(), StoreError> {
        let mut users = self.users()?;

        // Check and insert under one lock so two signups cannot both win.
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UsernameTaken);
        }

        users.insert(
            user.id,
            User {
                id: user.id,
                username: user.username.clone(),
                password_hash: user.password_hash.clone(),
                refresh_token_hash: None,
            },
        );
        Ok(())
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, StoreError> {
        Ok(self
            .users()?
            .values()
            .find(|u| u.username == username)
            .map(|u| UserCredentials {
                id: u.id,
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users()?.get(&id).cloned())
    }

    async fn refresh_token_hash(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self
            .users()?
            .get(&id)
            .and_then(|u| u.refresh_token_hash.clone()))
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<(), StoreError> {
        let mut users = self.users()?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.refresh_token_hash = hash.map(str::to_string);
        Ok(())
    }

    async fn replace_refresh_token_hash(
        &self,
        id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users()?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;

        if user.refresh_token_hash.as_deref() != Some(current) {
            return Ok(false);
        }
        user.refresh_token_hash = Some(new.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::new();
        let user = new_user("alice");
        store.insert_user(&user).await.unwrap();

        let creds = store.find_credentials("alice").await.unwrap().unwrap();
        assert_eq!(creds.id, user.id);
        assert_eq!(creds.password_hash, user.password_hash);

        let record = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(record.username, "alice");
        assert!(record.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = InMemoryUserStore::new();
        store.insert_user(&new_user("alice")).await.unwrap();

        let result = store.insert_user(&new_user("alice")).await;
        assert_eq!(result, Err(StoreError::UsernameTaken));
    }

    #[tokio::test]
    async fn test_refresh_hash_overwrite_and_clear() {
        let store = InMemoryUserStore::new();
        let user = new_user("alice");
        store.insert_user(&user).await.unwrap();

        store.set_refresh_token_hash(user.id, Some("first")).await.unwrap();
        store.set_refresh_token_hash(user.id, Some("second")).await.unwrap();
        assert_eq!(
            store.refresh_token_hash(user.id).await.unwrap(),
            Some("second".to_string())
        );

        store.set_refresh_token_hash(user.id, None).await.unwrap();
        assert_eq!(store.refresh_token_hash(user.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_refresh_hash_only_from_current_value() {
        let store = InMemoryUserStore::new();
        let user = new_user("alice");
        store.insert_user(&user).await.unwrap();
        store.set_refresh_token_hash(user.id, Some("first")).await.unwrap();

        assert!(store
            .replace_refresh_token_hash(user.id, "first", "second")
            .await
            .unwrap());
        // A second swap from the old value loses.
        assert!(!store
            .replace_refresh_token_hash(user.id, "first", "third")
            .await
            .unwrap());
        assert_eq!(
            store.refresh_token_hash(user.id).await.unwrap(),
            Some("second".to_string())
        );

        store.set_refresh_token_hash(user.id, None).await.unwrap();
        assert!(!store
            .replace_refresh_token_hash(user.id, "second", "fourth")
            .await
            .unwrap());
        assert_eq!(
            store.replace_refresh_token_hash(Uuid::new_v4(), "a", "b").await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = InMemoryUserStore::new();
        let id = Uuid::new_v4();

        assert!(store.find_credentials("nobody").await.unwrap().is_none());
        assert_eq!(store.refresh_token_hash(id).await.unwrap(), None);
        assert_eq!(
            store.set_refresh_token_hash(id, Some("hash")).await,
            Err(StoreError::NotFound)
        );
    }
}
