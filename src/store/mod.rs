/// User store
///
/// Persists credential records and the hash of each user's current refresh
/// token. Every write touches a single row, so concurrent logins for the
/// same user resolve as last-write-wins.

mod memory;
mod postgres;
mod timeout;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;
pub use timeout::TimeoutStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;

/// Full user record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    /// `None` until the first login and again after logout
    pub refresh_token_hash: Option<String>,
}

/// Record written at signup
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// What login needs to know about a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `UsernameTaken` if the name exists.
    async fn insert_user(&self, user: &NewUser) -> Result<(), StoreError>;

    async fn find_credentials(&self, username: &str) -> Result<Option<UserCredentials>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Stored refresh-token hash; `None` for unknown users too
    async fn refresh_token_hash(&self, id: Uuid) -> Result<Option<String>, StoreError>;

    /// Replace (or clear) the stored refresh-token hash in one write.
    /// Fails with `NotFound` if there is no such user.
    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<(), StoreError>;

    /// Swap the stored refresh-token hash from `current` to `new` in one
    /// conditional write. `Ok(false)` means the stored value was no longer
    /// `current`, i.e. another rotation or login got there first.
    async fn replace_refresh_token_hash(
        &self,
        id: Uuid,
        current: &str,
        new: &str,
    ) -> Result<bool, StoreError>;
}
