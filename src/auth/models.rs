//! Authentication Models
//! Mission: Define user, token and request/response shapes for the auth surface

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub created_at: String,
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub iat: i64,
    pub exp: i64,
    pub jti: String, // keeps same-second tokens distinct
}

/// Freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Authenticated request context, attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct Session {
    pub subject_id: String,
    /// Raw bearer string, kept so logout can revoke exactly this token.
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl Session {
    pub fn from_claims(token: String, claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            token,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// Register request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
}

/// Register/login response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Plain `{msg}` body used across the API
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// One failed input check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub param: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            param: param.to_string(),
            msg: msg.to_string(),
        }
    }
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Loose address check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    let first_ok = labels.next().map(|l| !l.is_empty()).unwrap_or(false);
    let rest: Vec<&str> = labels.collect();
    first_ok && !rest.is_empty() && rest.iter().all(|l| !l.is_empty())
}

impl RegisterRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Please include a valid email"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                "Password must be 6 or more characters",
            ));
        }
        errors
    }
}

impl LoginRequest {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Please include a valid email"));
        }
        if self.password.is_none() {
            errors.push(FieldError::new("password", "Password is required"));
        }
        errors
    }
}
