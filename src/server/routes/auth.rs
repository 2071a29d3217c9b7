//! Registration, login, and token rotation

use crate::auth::{hash_password, verify_password, TokenKind};
use crate::error::Error;
use crate::meta::User;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::{AuthUser, ValidJson};
use crate::server::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn username_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").ok())
        .as_ref()
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if !email_pattern().is_some_and(|re| re.is_match(req.email.trim())) {
        return Err(ApiError::validation("Invalid email address"));
    }
    let username_len = req.username.chars().count();
    if !(3..=50).contains(&username_len) {
        return Err(ApiError::validation(
            "Username must be between 3 and 50 characters",
        ));
    }
    if !username_pattern().is_some_and(|re| re.is_match(&req.username)) {
        return Err(ApiError::validation(
            "Username may only contain letters, digits, '_' and '-'",
        ));
    }
    let password_len = req.password.chars().count();
    if !(8..=128).contains(&password_len) {
        return Err(ApiError::validation(
            "Password must be between 8 and 128 characters",
        ));
    }
    Ok(())
}

/// Issue a token pair and remember the refresh token
async fn token_response(state: &AppState, user: User) -> ApiResult<TokenResponse> {
    let pair = state.tokens.issue(&user.id)?;
    state
        .services
        .db
        .insert_refresh_token(&pair.refresh_jti, &user.id, pair.refresh_expires_at)
        .await?;

    Ok(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer".to_string(),
        expires_in: pair.expires_in,
        user: user.into(),
    })
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    validate_registration(&req)?;

    let mut user = User::new(
        req.email.trim().to_lowercase(),
        req.username.clone(),
        hash_password(&req.password)?,
    );
    user.full_name = req.full_name.filter(|n| !n.trim().is_empty());
    state.services.db.insert_user(&user).await?;
    info!("Registered user {}", user.username);

    let response = token_response(&state, user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .services
        .db
        .get_user_by_email(req.email.trim())
        .await?
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !user.is_active {
        return Err(Error::Forbidden("Inactive user".to_string()).into());
    }

    Ok(Json(token_response(&state, user).await?))
}

/// POST /api/v1/auth/refresh; the presented refresh token is revoked
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = state.tokens.verify(&req.refresh_token, TokenKind::Refresh)?;
    let db = &state.services.db;

    let stored = db
        .get_refresh_token(&claims.jti)
        .await?
        .filter(|t| !t.revoked && t.user_id == claims.sub)
        .ok_or_else(|| ApiError::unauthorized("Refresh token revoked or unknown"))?;

    if !db.revoke_refresh_token(&stored.id).await? {
        return Err(ApiError::unauthorized("Refresh token already used"));
    }

    let user = db
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    if !user.is_active {
        return Err(Error::Forbidden("Inactive user".to_string()).into());
    }

    Ok(Json(token_response(&state, user).await?))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidJson(req): ValidJson<RefreshRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let claims = state.tokens.verify(&req.refresh_token, TokenKind::Refresh)?;
    if claims.sub != user.id {
        return Err(ApiError::unauthorized("Refresh token belongs to another user"));
    }
    state.services.db.revoke_refresh_token(&claims.jti).await?;

    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// GET /api/v1/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
