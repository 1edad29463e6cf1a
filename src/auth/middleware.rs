//! Authentication Middleware
//! Mission: Protect API endpoints with token validation and the revocation gate

use crate::auth::session::{AuthError, SessionGate};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Pull the bearer string out of the Authorization header.
///
/// A value without the `Bearer ` prefix is taken as the raw token; an absent
/// or blank value yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!token.is_empty()).then_some(token)
}

/// Auth middleware that validates session tokens
pub async fn auth_middleware(
    State(gate): State<Arc<SessionGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::Missing)?;

    let session = gate.authenticate(token).await?;

    // Add session to request extensions so handlers can access it
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}
