use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::claims::TokenType;
use crate::auth::gate::resolve_principal;
use crate::auth::issuer::{TokenIssuer, TokenPair};
use crate::auth::ledger::RefreshTokenLedger;
use crate::auth::password::{hash_password, password_matches};
use crate::auth::signer::CredentialSigner;
use crate::config::Settings;
use crate::db::{RefreshTokenStore, User, UserStore};
use crate::error::{AuthError, DatabaseError};
use crate::Result;

/// Sign-up, sign-in and the token lifecycle on top of the signer, issuer
/// and ledger.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    ledger: RefreshTokenLedger,
    issuer: TokenIssuer,
    signer: Arc<CredentialSigner>,
    password_hash_cost: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        signer: Arc<CredentialSigner>,
        issuer: TokenIssuer,
        password_hash_cost: u32,
    ) -> Self {
        Self {
            users,
            ledger: RefreshTokenLedger::new(refresh_tokens),
            issuer,
            signer,
            password_hash_cost,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        signer: Arc<CredentialSigner>,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        let issuer = TokenIssuer::new(
            signer.clone(),
            settings.issuer(),
            Duration::minutes(settings.auth.access_token_ttl_minutes),
            Duration::days(settings.auth.refresh_token_ttl_days),
        );

        Self::new(users, refresh_tokens, signer, issuer, settings.auth.password_hash_cost)
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.issuer.access_ttl()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        if self.users.get_user_by_email(email).await?.is_some() {
            return Err(DatabaseError::Duplicate.into());
        }

        let password_hash = hash_password(password, self.password_hash_cost).await?;
        let user = self.users.create_user(&User::new(email.to_string(), password_hash)).await?;

        info!(user_id = %user.id, "user signed up");
        Ok(user)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TokenPair> {
        let user = self
            .users
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password_matches(&user, password).await? {
            warn!(user_id = %user.id, "sign-in with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = self.issue_for_subject(user.id).await?;
        info!(user_id = %user.id, "user signed in");
        Ok(pair)
    }

    /// Issues a fresh pair and makes its refresh half the subject's only
    /// live session.
    pub async fn issue_for_subject(&self, subject: Uuid) -> Result<TokenPair> {
        let pair = self.issuer.issue(subject)?;
        self.ledger.store_for_subject(subject, &pair.refresh).await?;
        Ok(pair)
    }

    pub async fn verify_access_token(&self, raw: &str) -> Result<User> {
        let claims = self.signer.verify(raw).map_err(AuthError::InvalidToken)?;
        claims.expect_type(TokenType::Access)?;

        Ok(resolve_principal(self.users.as_ref(), &claims).await??)
    }

    /// Redeems a refresh token for a new pair. The presented token is dead
    /// afterwards, whether or not the caller receives the new pair.
    pub async fn rotate(&self, presented: &str) -> Result<TokenPair> {
        let claims = self.signer.verify(presented).map_err(AuthError::InvalidToken)?;
        claims.expect_type(TokenType::Refresh)?;
        let subject = claims.subject_id()?;

        let record = self
            .ledger
            .lookup(subject, presented)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if record.is_expired() {
            warn!(user_id = %subject, "expired refresh token presented");
            return Err(AuthError::SessionExpired.into());
        }

        resolve_principal(self.users.as_ref(), &claims).await??;

        let pair = self.issuer.issue(subject)?;
        if self.ledger.swap(subject, presented, &pair.refresh).await?.is_none() {
            warn!(user_id = %subject, "refresh token already redeemed");
            return Err(AuthError::SessionNotFound.into());
        }

        info!(user_id = %subject, "rotated token pair");
        Ok(pair)
    }

    pub async fn revoke_session(&self, subject: Uuid) -> Result<()> {
        let removed = self.ledger.revoke_all(subject).await?;
        info!(user_id = %subject, removed, "session revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ledger::hash_token;
    use crate::auth::signer::VerificationError;
    use crate::db::{MemoryStore, RefreshTokenRecord};
    use crate::error::AppError;
    use chrono::Utc;

    struct Fixture {
        service: AuthService,
        store: MemoryStore,
        user: User,
    }

    async fn fixture() -> Fixture {
        let settings = Settings::new_for_test().unwrap();
        let store = MemoryStore::new();
        let signer = Arc::new(CredentialSigner::new(settings.auth.jwt_secret.as_bytes()));
        let service = AuthService::from_settings(
            &settings,
            signer,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        );
        let user = service.sign_up("u1@example.com", "password123").await.unwrap();
        Fixture { service, store, user }
    }

    #[tokio::test]
    async fn test_issue_for_subject_yields_verifiable_pair() {
        let f = fixture().await;
        let pair = f.service.issue_for_subject(f.user.id).await.unwrap();

        assert_eq!(pair.access.claims.subject_id().unwrap(), f.user.id);
        assert_eq!(pair.refresh.claims.subject_id().unwrap(), f.user.id);
        assert!(pair.access.claims.exp < pair.refresh.claims.exp);

        let principal = f.service.verify_access_token(&pair.access.raw).await.unwrap();
        assert_eq!(principal.id, f.user.id);
    }

    #[tokio::test]
    async fn test_token_classes_are_not_interchangeable() {
        let f = fixture().await;
        let pair = f.service.issue_for_subject(f.user.id).await.unwrap();

        let result = f.service.verify_access_token(&pair.refresh.raw).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::WrongTokenType { .. }))));

        let result = f.service.rotate(&pair.access.raw).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::WrongTokenType { .. }))));
    }

    #[tokio::test]
    async fn test_rotation_is_single_use() {
        let f = fixture().await;
        let original = f.service.issue_for_subject(f.user.id).await.unwrap();

        let rotated = f.service.rotate(&original.refresh.raw).await.unwrap();
        assert_ne!(rotated.refresh.raw, original.refresh.raw);
        assert_eq!(rotated.refresh.claims.subject_id().unwrap(), f.user.id);

        let again = f.service.rotate(&original.refresh.raw).await;
        assert!(matches!(again, Err(AppError::AuthError(AuthError::SessionNotFound))));

        assert!(f.service.rotate(&rotated.refresh.raw).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_latest_sign_in_can_rotate() {
        let f = fixture().await;
        let first = f.service.sign_in("u1@example.com", "password123").await.unwrap();
        let second = f.service.sign_in("u1@example.com", "password123").await.unwrap();

        let result = f.service.rotate(&first.refresh.raw).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::SessionNotFound))));
        assert!(f.service.rotate(&second.refresh.raw).await.is_ok());
        assert_eq!(f.store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_session_cannot_rotate() {
        let f = fixture().await;
        let pair = f.service.issue_for_subject(f.user.id).await.unwrap();

        // The token itself still verifies; only the stored session has lapsed.
        let lapsed = RefreshTokenRecord::new(
            f.user.id,
            hash_token(&pair.refresh.raw),
            Utc::now() - Duration::seconds(10),
        );
        assert!(f.store.replace_refresh_token(&lapsed, None).await.unwrap());

        let result = f.service.rotate(&pair.refresh.raw).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::SessionExpired))));
        assert_eq!(f.store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_revoked_session_cannot_rotate() {
        let f = fixture().await;
        let pair = f.service.issue_for_subject(f.user.id).await.unwrap();

        f.service.revoke_session(f.user.id).await.unwrap();

        let result = f.service.rotate(&pair.refresh.raw).await;
        assert!(matches!(result, Err(AppError::AuthError(AuthError::SessionNotFound))));
    }

    #[tokio::test]
    async fn test_forged_refresh_token_rejected() {
        let f = fixture().await;
        let foreign = Arc::new(CredentialSigner::new(b"attacker_secret"));
        let issuer =
            TokenIssuer::new(foreign, "x".into(), Duration::minutes(15), Duration::days(30));
        let forged = issuer.issue(f.user.id).unwrap();

        let result = f.service.rotate(&forged.refresh.raw).await;
        assert!(matches!(
            result,
            Err(AppError::AuthError(AuthError::InvalidToken(VerificationError::SignatureInvalid)))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_failures_look_alike() {
        let f = fixture().await;

        let wrong_password = f.service.sign_in("u1@example.com", "nope").await;
        let unknown_email = f.service.sign_in("nobody@example.com", "password123").await;

        assert!(matches!(wrong_password, Err(AppError::AuthError(AuthError::InvalidCredentials))));
        assert!(matches!(unknown_email, Err(AppError::AuthError(AuthError::InvalidCredentials))));
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_conflicts() {
        let f = fixture().await;
        let result = f.service.sign_up("u1@example.com", "password123").await;
        assert!(matches!(result, Err(AppError::DatabaseError(DatabaseError::Duplicate))));
    }
}
