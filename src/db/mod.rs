//! Persistence layer for the auth service.
//!
//! The auth core only talks to the two traits below; `DbOperations` backs
//! them with Postgres and `MemoryStore` keeps everything in process.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

pub use memory::MemoryStore;
pub use models::{RefreshTokenRecord, User};
pub use operations::DbOperations;

/// Lookup and creation of principals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<User>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Transactional storage of refresh token digests, at most one per user.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Deletes every record of `record.user_id` and inserts `record` as one
    /// atomic step.
    ///
    /// With `expected_hash` set, the replacement only happens if the user's
    /// current record carries that hash; `Ok(false)` means it did not and
    /// nothing was written.
    async fn replace_refresh_token(
        &self,
        record: &RefreshTokenRecord,
        expected_hash: Option<&str>,
    ) -> Result<bool>;

    async fn find_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>>;

    async fn delete_refresh_tokens(&self, user_id: Uuid) -> Result<u64>;
}
