use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{RefreshTokenRecord, User};
use crate::db::{RefreshTokenStore, UserStore};
use crate::error::AuthError;
use crate::Result;

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn get_pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DbPoolStatus {
            total_connections: size,
            active_connections: size.saturating_sub(idle),
            idle_connections: idle,
        }
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Row lock on the owner, held until the transaction ends. Every writer
    /// of a user's refresh token takes it first. `false` if the user is gone.
    async fn lock_user(user_id: Uuid, transaction: &mut Transaction<'_, Postgres>) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **transaction)
            .await?;

        Ok(row.is_some())
    }

    async fn replace_refresh_token_with_transaction(
        &self,
        record: &RefreshTokenRecord,
        expected_hash: Option<&str>,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<bool> {
        if !Self::lock_user(record.user_id, transaction).await? {
            return Err(AuthError::UnknownSubject.into());
        }

        if let Some(expected_hash) = expected_hash {
            let current = sqlx::query_scalar::<_, String>(
                "SELECT token_hash FROM refresh_tokens WHERE user_id = $1 AND token_hash = $2",
            )
            .bind(record.user_id)
            .bind(expected_hash)
            .fetch_optional(&mut **transaction)
            .await?;

            if current.is_none() {
                return Ok(false);
            }
        }

        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(record.user_id)
            .execute(&mut **transaction)
            .await?
            .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&mut **transaction)
        .await?;

        debug!(user_id = %record.user_id, deleted, "replaced refresh token record");
        Ok(true)
    }

    async fn delete_refresh_tokens_with_transaction(
        &self,
        user_id: Uuid,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<u64> {
        // No owner row means the cascade already removed its tokens.
        if !Self::lock_user(user_id, transaction).await? {
            return Ok(0);
        }

        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **transaction)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenStore for DbOperations {
    async fn replace_refresh_token(
        &self,
        record: &RefreshTokenRecord,
        expected_hash: Option<&str>,
    ) -> Result<bool> {
        let mut transaction = self.begin_transaction().await?;

        let result = self
            .replace_refresh_token_with_transaction(record, expected_hash, &mut transaction)
            .await;

        match result {
            Ok(true) => {
                transaction.commit().await?;
                Ok(true)
            }
            Ok(false) => {
                transaction.rollback().await?;
                Ok(false)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn find_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT user_id, token_hash, created_at, expires_at
            FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn delete_refresh_tokens(&self, user_id: Uuid) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;

        let result = self
            .delete_refresh_tokens_with_transaction(user_id, &mut transaction)
            .await;

        match result {
            Ok(deleted) => {
                transaction.commit().await?;
                Ok(deleted)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
