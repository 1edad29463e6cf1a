//! Authentication API Endpoints
//! Mission: Register, log in, and log out users

use crate::api::run_blocking;
use crate::auth::{
    models::{
        FieldError, LoginRequest, MessageResponse, RegisterRequest, Session, TokenResponse,
    },
    session::{AuthError, RevokeError, RevokeOutcome, SessionGate},
    user_store::{CreateUser, UserStore},
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub gate: Arc<SessionGate>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, gate: Arc<SessionGate>) -> Self {
        Self { user_store, gate }
    }
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(AuthApiError::Validation(errors));
    }

    let users = state.user_store.clone();
    let created = run_blocking(move || users.create_user(&payload.email, &payload.password))
        .await
        .map_err(AuthApiError::internal)?;

    let user = match created {
        CreateUser::Created(user) => user,
        CreateUser::AlreadyExists => {
            info!("Registration rejected: email already in use");
            return Err(AuthApiError::UserAlreadyExists);
        }
    };

    let issued = state
        .gate
        .issue(&user.id.to_string())
        .map_err(AuthApiError::internal)?;

    info!(user_id = %user.id, "📝 Registration successful");

    Ok(Json(TokenResponse {
        token: issued.token,
    }))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthApiError> {
    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(AuthApiError::Validation(errors));
    }
    let password = payload.password.unwrap_or_default();

    let users = state.user_store.clone();
    let user = run_blocking(move || users.verify_credentials(&payload.email, &password))
        .await
        .map_err(AuthApiError::internal)?
        .ok_or_else(|| {
            warn!("❌ Failed login attempt");
            AuthApiError::InvalidCredentials
        })?;

    let issued = state
        .gate
        .issue(&user.id.to_string())
        .map_err(AuthApiError::internal)?;

    info!(user_id = %user.id, "✅ Login successful");

    Ok(Json(TokenResponse {
        token: issued.token,
    }))
}

/// Logout endpoint - POST /api/auth/logout (behind auth middleware)
pub async fn logout(
    State(state): State<AuthState>,
    Extension(session): Extension<Session>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    match state.gate.revoke(&session.token).await {
        Ok(RevokeOutcome::Revoked { .. }) | Ok(RevokeOutcome::AlreadyExpired) => {
            info!(user_id = %session.subject_id, "👋 Logged out");
            Ok(Json(MessageResponse::new("Logged out successfully")))
        }
        Err(RevokeError::Unauthenticated(e)) => Err(AuthApiError::Unauthenticated(e)),
        Err(RevokeError::Store(e)) => Err(AuthApiError::internal(e)),
    }
}

/// Sample protected endpoint - GET /api/protected
pub async fn protected(Extension(session): Extension<Session>) -> Json<serde_json::Value> {
    Json(json!({
        "msg": "This is a protected route",
        "user": { "id": session.subject_id },
    }))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    Validation(Vec<FieldError>),
    UserAlreadyExists,
    InvalidCredentials,
    Unauthenticated(AuthError),
    InternalError,
}

impl AuthApiError {
    /// Log the cause server-side and hide it from the client.
    pub fn internal(e: impl std::fmt::Display) -> Self {
        error!("Auth request failed: {}", e);
        AuthApiError::InternalError
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        match self {
            AuthApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            AuthApiError::UserAlreadyExists => (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new("User already exists")),
            )
                .into_response(),
            AuthApiError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                Json(MessageResponse::new("Invalid credentials")),
            )
                .into_response(),
            AuthApiError::Unauthenticated(e) => e.into_response(),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MessageResponse::new("Server error")),
            )
                .into_response(),
        }
    }
}
