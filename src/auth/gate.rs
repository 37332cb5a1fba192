//! Per-request authorization check.
//!
//! The gate is an explicit, ordered list of predicates. Each one looks at the
//! request (and what earlier predicates found) and either allows, rejects,
//! or passes to the next. Falling off the end of the list is a rejection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::claims::{Claims, TokenType};
use crate::auth::signer::CredentialSigner;
use crate::db::{User, UserStore};
use crate::error::AuthError;
use crate::Result;

/// The parts of an HTTP request the gate reads.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    pub authorization: Option<&'a str>,
}

/// What the predicates have established so far.
#[derive(Debug, Default)]
pub struct GateContext {
    pub token: Option<String>,
    pub claims: Option<Claims>,
    pub principal: Option<User>,
}

#[derive(Debug)]
pub enum GateDecision {
    Allow,
    Reject(AuthError),
    Continue,
}

#[derive(Debug)]
pub enum GateOutcome {
    /// Public route, no credential inspected.
    Bypass,
    Authenticated(User),
    Rejected(AuthError),
}

#[async_trait]
pub trait GatePredicate: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` is reserved for infrastructure failures; the request is not let
    /// through in that case either.
    async fn evaluate(
        &self,
        request: &GateRequest<'_>,
        ctx: &mut GateContext,
    ) -> Result<GateDecision>;
}

pub struct AuthGate {
    predicates: Vec<Box<dyn GatePredicate>>,
}

impl AuthGate {
    pub fn new(predicates: Vec<Box<dyn GatePredicate>>) -> Self {
        Self { predicates }
    }

    /// Bypass, extract, verify, type-check, resolve.
    pub fn standard(
        public_paths: Vec<String>,
        signer: Arc<CredentialSigner>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self::new(vec![
            Box::new(PublicRoutes::new(public_paths)),
            Box::new(BearerToken),
            Box::new(VerifySignature::new(signer)),
            Box::new(RequireTokenType::new(TokenType::Access)),
            Box::new(ResolvePrincipal::new(users)),
        ])
    }

    pub fn predicate_names(&self) -> Vec<&'static str> {
        self.predicates.iter().map(|p| p.name()).collect()
    }

    pub async fn check(&self, request: &GateRequest<'_>) -> Result<GateOutcome> {
        let mut ctx = GateContext::default();

        for predicate in &self.predicates {
            match predicate.evaluate(request, &mut ctx).await? {
                GateDecision::Continue => continue,
                GateDecision::Reject(reason) => return Ok(GateOutcome::Rejected(reason)),
                GateDecision::Allow => {
                    return Ok(match ctx.principal {
                        Some(user) => GateOutcome::Authenticated(user),
                        None => GateOutcome::Bypass,
                    });
                }
            }
        }

        Ok(GateOutcome::Rejected(AuthError::Unauthorized))
    }
}

/// Allows paths under any of the given prefixes, matched on whole segments.
pub struct PublicRoutes {
    prefixes: Vec<String>,
}

impl PublicRoutes {
    pub fn new(prefixes: Vec<String>) -> Self {
        let prefixes = prefixes
            .into_iter()
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { prefixes }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

#[async_trait]
impl GatePredicate for PublicRoutes {
    fn name(&self) -> &'static str {
        "public_routes"
    }

    async fn evaluate(
        &self,
        request: &GateRequest<'_>,
        _ctx: &mut GateContext,
    ) -> Result<GateDecision> {
        Ok(if self.matches(request.path) {
            GateDecision::Allow
        } else {
            GateDecision::Continue
        })
    }
}

pub struct BearerToken;

impl BearerToken {
    pub fn extract(header: Option<&str>) -> Option<&str> {
        header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[async_trait]
impl GatePredicate for BearerToken {
    fn name(&self) -> &'static str {
        "bearer_token"
    }

    async fn evaluate(
        &self,
        request: &GateRequest<'_>,
        ctx: &mut GateContext,
    ) -> Result<GateDecision> {
        match Self::extract(request.authorization) {
            Some(token) => {
                ctx.token = Some(token.to_string());
                Ok(GateDecision::Continue)
            }
            None => Ok(GateDecision::Reject(AuthError::MissingToken)),
        }
    }
}

pub struct VerifySignature {
    signer: Arc<CredentialSigner>,
}

impl VerifySignature {
    pub fn new(signer: Arc<CredentialSigner>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl GatePredicate for VerifySignature {
    fn name(&self) -> &'static str {
        "verify_signature"
    }

    async fn evaluate(
        &self,
        _request: &GateRequest<'_>,
        ctx: &mut GateContext,
    ) -> Result<GateDecision> {
        let Some(token) = ctx.token.as_deref() else {
            return Ok(GateDecision::Reject(AuthError::MissingToken));
        };

        match self.signer.verify(token) {
            Ok(claims) => {
                ctx.claims = Some(claims);
                Ok(GateDecision::Continue)
            }
            Err(e) => Ok(GateDecision::Reject(AuthError::InvalidToken(e))),
        }
    }
}

pub struct RequireTokenType {
    expected: TokenType,
}

impl RequireTokenType {
    pub fn new(expected: TokenType) -> Self {
        Self { expected }
    }
}

#[async_trait]
impl GatePredicate for RequireTokenType {
    fn name(&self) -> &'static str {
        "require_token_type"
    }

    async fn evaluate(
        &self,
        _request: &GateRequest<'_>,
        ctx: &mut GateContext,
    ) -> Result<GateDecision> {
        let Some(claims) = ctx.claims.as_ref() else {
            return Ok(GateDecision::Reject(AuthError::Unauthorized));
        };

        Ok(match claims.expect_type(self.expected) {
            Ok(()) => GateDecision::Continue,
            Err(e) => GateDecision::Reject(e),
        })
    }
}

pub struct ResolvePrincipal {
    users: Arc<dyn UserStore>,
}

impl ResolvePrincipal {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl GatePredicate for ResolvePrincipal {
    fn name(&self) -> &'static str {
        "resolve_principal"
    }

    async fn evaluate(
        &self,
        _request: &GateRequest<'_>,
        ctx: &mut GateContext,
    ) -> Result<GateDecision> {
        let Some(claims) = ctx.claims.as_ref() else {
            return Ok(GateDecision::Reject(AuthError::Unauthorized));
        };

        match resolve_principal(self.users.as_ref(), claims).await? {
            Ok(user) => {
                ctx.principal = Some(user);
                Ok(GateDecision::Allow)
            }
            Err(e) => Ok(GateDecision::Reject(e)),
        }
    }
}

/// Outer error: the store failed. Inner error: the subject is unusable.
pub async fn resolve_principal(
    users: &dyn UserStore,
    claims: &Claims,
) -> Result<std::result::Result<User, AuthError>> {
    let id = match claims.subject_id() {
        Ok(id) => id,
        Err(e) => return Ok(Err(e)),
    };

    Ok(users.get_user_by_id(id).await?.ok_or(AuthError::UnknownSubject))
}
