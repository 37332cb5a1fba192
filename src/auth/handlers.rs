use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::issuer::TokenPair;
use crate::auth::middleware::AuthenticatedUser;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ServerResponse<T> {
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ServerResponse<T> {
    pub fn data(data: T) -> Self {
        Self { data: Some(data), message: None }
    }
}

impl ServerResponse<()> {
    pub fn message(message: &str) -> Self {
        Self { data: None, message: Some(message.to_string()) }
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl CredentialsRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() {
            return Err(AppError::ValidationError("email is required".into()));
        }
        if self.password.is_empty() {
            return Err(AppError::ValidationError("password is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            expires_in: pair.access.claims.exp - pair.access.claims.iat,
            access_token: pair.access.raw,
            refresh_token: pair.refresh.raw,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn signup(
    req: web::Json<CredentialsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;
    let email = req.email.trim();

    match state.auth_service.sign_up(email, &req.password).await {
        Ok(user) => Ok(HttpResponse::Created().json(ServerResponse {
            data: Some(UserResponse {
                id: user.id,
                email: user.email,
                created_at: user.created_at,
            }),
            message: Some("successfully signed up user".to_string()),
        })),
        Err(e) => {
            warn!(error = %e, "sign-up failed");
            Err(e)
        }
    }
}

pub async fn signin(
    req: web::Json<CredentialsRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    req.validate()?;

    let pair = state.auth_service.sign_in(req.email.trim(), &req.password).await?;
    Ok(HttpResponse::Ok().json(ServerResponse::data(TokenResponse::from(pair))))
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.refresh_token.is_empty() {
        return Err(AppError::ValidationError("refresh token is required".into()));
    }

    let pair = state.auth_service.rotate(&req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(ServerResponse::data(TokenResponse::from(pair))))
}

pub async fn signout(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.revoke_session(user.0.id).await?;
    info!(user_id = %user.0.id, "user signed out");

    Ok(HttpResponse::Ok().json(ServerResponse::message("Successfully signed out")))
}

pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    let AuthenticatedUser(user) = user;
    HttpResponse::Ok().json(ServerResponse::data(UserResponse {
        id: user.id,
        email: user.email,
        created_at: user.created_at,
    }))
}
