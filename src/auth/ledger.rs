use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::auth::issuer::IssuedToken;
use crate::db::{RefreshTokenRecord, RefreshTokenStore};
use crate::Result;

/// Base64 SHA-256 digest of a raw token. Raw refresh tokens are never stored.
pub fn hash_token(raw: &str) -> String {
    BASE64.encode(Sha256::digest(raw.as_bytes()))
}

/// The record of the one live refresh token per subject.
#[derive(Clone)]
pub struct RefreshTokenLedger {
    store: Arc<dyn RefreshTokenStore>,
}

impl RefreshTokenLedger {
    pub fn new(store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { store }
    }

    /// Replaces whatever session `subject` had with `token`.
    pub async fn store_for_subject(
        &self,
        subject: Uuid,
        token: &IssuedToken,
    ) -> Result<RefreshTokenRecord> {
        let record = RefreshTokenRecord::new(subject, hash_token(&token.raw), token.expires_at());
        self.store.replace_refresh_token(&record, None).await?;
        debug!(user_id = %subject, "stored refresh token");
        Ok(record)
    }

    /// Like `store_for_subject`, but only if `presented` is still the live
    /// token at write time. `None` means another writer got there first.
    pub async fn swap(
        &self,
        subject: Uuid,
        presented: &str,
        replacement: &IssuedToken,
    ) -> Result<Option<RefreshTokenRecord>> {
        let expected = hash_token(presented);
        let record = RefreshTokenRecord::new(
            subject,
            hash_token(&replacement.raw),
            replacement.expires_at(),
        );

        if self.store.replace_refresh_token(&record, Some(&expected)).await? {
            debug!(user_id = %subject, "rotated refresh token");
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// Existence only; freshness is the caller's check.
    pub async fn lookup(
        &self,
        subject: Uuid,
        presented: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        self.store.find_refresh_token(subject, &hash_token(presented)).await
    }

    pub async fn revoke_all(&self, subject: Uuid) -> Result<u64> {
        let removed = self.store.delete_refresh_tokens(subject).await?;
        debug!(user_id = %subject, removed, "revoked refresh tokens");
        Ok(removed)
    }
}
