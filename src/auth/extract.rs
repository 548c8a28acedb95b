use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::db::models::{Investor, User};
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Token from `Authorization`, with or without the `Bearer ` scheme.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string())
        .filter(|token| !token.is_empty())
}

fn app_state(req: &HttpRequest) -> Option<web::Data<AppState>> {
    req.app_data::<web::Data<AppState>>().cloned()
}

fn missing_state() -> AppError {
    AppError::InternalError("application state is not configured".into())
}

/// Collapses any auth failure into the single client-facing rejection. Store
/// failures are passed through.
fn reject(err: AppError) -> AppError {
    match err {
        AppError::DatabaseError(e) => AppError::DatabaseError(e),
        other => {
            debug!("Rejected token: {}", other);
            AuthError::InvalidToken.into()
        }
    }
}

/// The raw bearer token of the request.
pub struct BearerToken(pub String);

impl FromRequest for BearerToken {
    type Error = AppError;
    type Future = futures::future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        futures::future::ready(bearer_token(req).map(BearerToken).ok_or_else(|| AuthError::MissingToken.into()))
    }
}

/// A farmer authenticated by bearer token.
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(missing_state)?;
            let token = token.ok_or(AuthError::MissingToken)?;
            state
                .auth_service
                .authenticate_farmer(&token)
                .await
                .map(AuthenticatedUser)
                .map_err(reject)
        })
    }
}

pub struct AuthenticatedInvestor(pub Investor);

impl FromRequest for AuthenticatedInvestor {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(missing_state)?;
            let token = token.ok_or(AuthError::MissingToken)?;
            state
                .auth_service
                .authenticate_investor(&token)
                .await
                .map(AuthenticatedInvestor)
                .map_err(reject)
        })
    }
}

/// Either kind of account. Farmers may act as investors on the investment board.
pub enum Principal {
    Farmer(User),
    Investor(Investor),
}

impl Principal {
    pub fn id(&self) -> uuid::Uuid {
        match self {
            Principal::Farmer(user) => user.id,
            Principal::Investor(investor) => investor.id,
        }
    }
}

impl FromRequest for Principal {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = app_state(req);
        let token = bearer_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(missing_state)?;
            let token = token.ok_or(AuthError::MissingToken)?;
            match state.auth_service.authenticate_investor(&token).await {
                Ok(investor) => Ok(Principal::Investor(investor)),
                Err(AppError::AuthError(_)) => state
                    .auth_service
                    .authenticate_farmer(&token)
                    .await
                    .map(Principal::Farmer)
                    .map_err(reject),
                Err(e) => Err(reject(e)),
            }
        })
    }
}
