use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures::future::{ready, Ready};
use std::time::Instant;
use tracing::{info, warn};

use crate::auth::gate::{GateOutcome, GateRequest};
use crate::db::User;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Runs the request gate in front of every route. Rejections are answered
/// here and never reach the handler.
pub async fn require_access_token<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        let err = AppError::InternalError("application state is not configured".into());
        return Ok(reject(req, err));
    };

    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);
    let path = req.path().to_owned();

    let outcome = state
        .gate
        .check(&GateRequest {
            path: &path,
            authorization: authorization.as_deref(),
        })
        .await;

    match outcome {
        Ok(GateOutcome::Bypass) => next.call(req).await.map(|res| res.map_into_left_body()),
        Ok(GateOutcome::Authenticated(user)) => {
            req.extensions_mut().insert(user);
            next.call(req).await.map(|res| res.map_into_left_body())
        }
        Ok(GateOutcome::Rejected(reason)) => {
            warn!(path = %path, reason = %reason, "request rejected by gate");
            Ok(reject(req, reason.into()))
        }
        Err(err) => Ok(reject(req, err)),
    }
}

fn reject<B>(req: ServiceRequest, err: AppError) -> ServiceResponse<EitherBody<B>> {
    let (req, _payload) = req.into_parts();
    ServiceResponse::new(req, err.error_response()).map_into_right_body()
}

pub async fn log_requests<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, Error> {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req.path().to_owned();

    let res = next.call(req).await?;
    info!(
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "http request"
    );
    Ok(res)
}

/// The principal the gate bound to this request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<User>()
                .cloned()
                .map(AuthenticatedUser)
                .ok_or(AppError::AuthError(AuthError::Unauthorized)),
        )
    }
}
