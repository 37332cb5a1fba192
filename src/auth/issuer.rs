use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenType};
use crate::auth::signer::CredentialSigner;
use crate::Result;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub raw: String,
    pub claims: Claims,
}

impl IssuedToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.claims.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Builds matched access/refresh pairs. Persisting the refresh half is left
/// to the caller.
pub struct TokenIssuer {
    signer: Arc<CredentialSigner>,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        signer: Arc<CredentialSigner>,
        issuer: String,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            signer,
            issuer,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue(&self, subject: Uuid) -> Result<TokenPair> {
        let now = Utc::now();

        Ok(TokenPair {
            access: self.issue_one(subject, TokenType::Access, now, self.access_ttl)?,
            refresh: self.issue_one(subject, TokenType::Refresh, now, self.refresh_ttl)?,
        })
    }

    fn issue_one(
        &self,
        subject: Uuid,
        token_type: TokenType,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedToken> {
        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        let raw = self.signer.sign(&claims)?;
        Ok(IssuedToken { raw, claims })
    }
}
