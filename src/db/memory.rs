use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{RefreshTokenRecord, User};
use crate::db::{RefreshTokenStore, UserStore};
use crate::error::{AuthError, DatabaseError};
use crate::Result;

/// In-process store. Each write holds the lock for its whole
/// check-delete-insert sequence, which gives the same per-user atomicity as
/// the Postgres transaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    refresh_tokens: Arc<RwLock<HashMap<Uuid, RefreshTokenRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;

        let taken = users.contains_key(&user.id)
            || users.values().any(|existing| existing.email == user.email);
        if taken {
            return Err(DatabaseError::Duplicate.into());
        }

        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn replace_refresh_token(
        &self,
        record: &RefreshTokenRecord,
        expected_hash: Option<&str>,
    ) -> Result<bool> {
        if !self.users.read().await.contains_key(&record.user_id) {
            return Err(AuthError::UnknownSubject.into());
        }

        let mut tokens = self.refresh_tokens.write().await;

        if let Some(expected_hash) = expected_hash {
            let matches = tokens
                .get(&record.user_id)
                .is_some_and(|current| current.token_hash == expected_hash);
            if !matches {
                return Ok(false);
            }
        }

        tokens.insert(record.user_id, record.clone());
        Ok(true)
    }

    async fn find_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let tokens = self.refresh_tokens.read().await;
        Ok(tokens
            .get(&user_id)
            .filter(|record| record.token_hash == token_hash)
            .cloned())
    }

    async fn delete_refresh_tokens(&self, user_id: Uuid) -> Result<u64> {
        let mut tokens = self.refresh_tokens.write().await;
        Ok(tokens.remove(&user_id).map_or(0, |_| 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::{Duration, Utc};

    async fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(&User::new("u1@example.com".into(), "hash".into()))
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (store, _) = store_with_user().await;
        let result = store
            .create_user(&User::new("u1@example.com".into(), "other".into()))
            .await;
        assert!(matches!(result, Err(AppError::DatabaseError(DatabaseError::Duplicate))));
    }

    #[tokio::test]
    async fn test_lookup_by_email_and_id() {
        let (store, user) = store_with_user().await;
        assert_eq!(store.get_user_by_id(user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(store.get_user_by_email("u1@example.com").await.unwrap(), Some(user));
        assert!(store.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_conditional_on_expected_hash() {
        let (store, user) = store_with_user().await;
        let expires = Utc::now() + Duration::days(1);

        let first = RefreshTokenRecord::new(user.id, "a".into(), expires);
        assert!(store.replace_refresh_token(&first, None).await.unwrap());

        let second = RefreshTokenRecord::new(user.id, "b".into(), expires);
        assert!(!store.replace_refresh_token(&second, Some("zzz")).await.unwrap());
        assert!(store.find_refresh_token(user.id, "a").await.unwrap().is_some());

        assert!(store.replace_refresh_token(&second, Some("a")).await.unwrap());
        assert!(store.find_refresh_token(user.id, "a").await.unwrap().is_none());
        assert!(store.find_refresh_token(user.id, "b").await.unwrap().is_some());
        assert_eq!(store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_replace_for_unknown_user_fails() {
        let store = MemoryStore::new();
        let record = RefreshTokenRecord::new(Uuid::new_v4(), "a".into(), Utc::now());
        let result = store.replace_refresh_token(&record, None).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::UnknownSubject))));
    }

    #[tokio::test]
    async fn test_delete_reports_count() {
        let (store, user) = store_with_user().await;
        let record = RefreshTokenRecord::new(user.id, "a".into(), Utc::now() + Duration::days(1));
        store.replace_refresh_token(&record, None).await.unwrap();

        assert_eq!(store.delete_refresh_tokens(user.id).await.unwrap(), 1);
        assert_eq!(store.delete_refresh_tokens(user.id).await.unwrap(), 0);
    }
}
