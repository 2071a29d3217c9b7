//! Request extractors: bearer auth and 422-on-failure JSON/query parsing

use super::error::ApiError;
use super::state::AppState;
use crate::auth::TokenKind;
use crate::error::Error;
use crate::meta::User;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Bearer token from an `Authorization` header, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// The authenticated, active caller
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        let claims = state.tokens.verify(token, TokenKind::Access)?;

        let user = state
            .services
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError(Error::Forbidden("Inactive user".to_string())));
        }
        Ok(AuthUser(user))
    }
}

/// `Json<T>` whose rejections are validation errors
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

/// `Query<T>` whose rejections are validation errors
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ValidQuery(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}
