//! Session Gate
//! Mission: Decide, per request, whether a bearer token still identifies someone
//!
//! A token is accepted only when its signature holds, it has not expired, and
//! no revocation entry exists for its exact string. Revocation-store failures
//! are treated as revoked (fail-closed).

use crate::auth::jwt::JwtHandler;
use crate::auth::models::{IssuedToken, Session};
use crate::auth::revocation::{RevocationStore, REVOKED_MARKER};
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a request could not be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential presented
    Missing,
    /// Credential explicitly invalidated (or the store could not vouch for it)
    Revoked,
    /// Malformed, tampered, or expired credential
    Invalid,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::Missing => "No token, authorization denied",
            AuthError::Revoked => "Token is blacklisted",
            AuthError::Invalid => "Token is not valid",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(json!({ "msg": self.message() }))).into_response()
    }
}

/// What a revoke call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// Entry written with this many seconds to live
    Revoked { ttl_secs: u64 },
    /// Token had already expired; nothing to remember
    AlreadyExpired,
}

/// Failure while revoking
#[derive(Debug)]
pub enum RevokeError {
    /// Token would not pass signature checks
    Unauthenticated(AuthError),
    /// Store write failed
    Store(anyhow::Error),
}

impl fmt::Display for RevokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevokeError::Unauthenticated(e) => write!(f, "{}", e),
            RevokeError::Store(e) => write!(f, "revocation store write failed: {:#}", e),
        }
    }
}

impl std::error::Error for RevokeError {}

/// Issuer + verifier + revocation gate, shared across handlers.
pub struct SessionGate {
    jwt: Arc<JwtHandler>,
    store: Arc<dyn RevocationStore>,
}

impl SessionGate {
    pub fn new(jwt: Arc<JwtHandler>, store: Arc<dyn RevocationStore>) -> Self {
        Self { jwt, store }
    }

    /// Mint a token for a subject whose credentials were already checked.
    pub fn issue(&self, subject_id: &str) -> Result<IssuedToken> {
        self.jwt.issue(subject_id)
    }

    /// Validate a raw bearer string.
    ///
    /// The revocation lookup runs before signature work so logged-out tokens
    /// are turned away cheaply.
    pub async fn authenticate(&self, token: &str) -> Result<Session, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        match self.store.get(token).await {
            Ok(Some(_)) => {
                debug!("Rejected revoked token");
                return Err(AuthError::Revoked);
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %format!("{:#}", e), "Revocation store unavailable; rejecting token");
                return Err(AuthError::Revoked);
            }
        }

        let claims = self.jwt.verify(token).map_err(|e| {
            debug!(error = %e, "Rejected invalid token");
            AuthError::Invalid
        })?;

        Ok(Session::from_claims(token.to_string(), claims))
    }

    /// Blacklist one token for the rest of its natural lifetime.
    ///
    /// Idempotent: revoking twice, or revoking an expired token, succeeds.
    pub async fn revoke(&self, token: &str) -> Result<RevokeOutcome, RevokeError> {
        let claims = self
            .jwt
            .decode(token)
            .map_err(|_| RevokeError::Unauthenticated(AuthError::Invalid))?;

        let remaining = claims.exp - self.jwt.clock().now();
        if remaining <= 0 {
            debug!(subject = %claims.sub, "Revoke on expired token is a no-op");
            return Ok(RevokeOutcome::AlreadyExpired);
        }

        let ttl_secs = remaining as u64;
        self.store
            .set_with_ttl(token, REVOKED_MARKER, ttl_secs)
            .await
            .context("Failed to write revocation entry")
            .map_err(RevokeError::Store)?;

        info!(subject = %claims.sub, ttl_secs, "🔒 Token revoked");
        Ok(RevokeOutcome::Revoked { ttl_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::{Clock, ManualClock};
    use crate::auth::jwt::DEFAULT_TOKEN_TTL_SECS;
    use crate::auth::revocation::MemoryRevocationStore;
    use async_trait::async_trait;

    const SECRET: &[u8] = b"session-gate-test-secret-0123456789";
    const T0: i64 = 1_700_000_000;

    struct Harness {
        gate: SessionGate,
        store: Arc<MemoryRevocationStore>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(T0);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let jwt = Arc::new(JwtHandler::new(SECRET, DEFAULT_TOKEN_TTL_SECS, shared.clone()));
        let store = Arc::new(MemoryRevocationStore::new(shared));
        Harness {
            gate: SessionGate::new(jwt, store.clone()),
            store,
            clock,
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl RevocationStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_issue_then_authenticate() {
        let h = harness();
        let issued = h.gate.issue("u1").unwrap();

        let session = h.gate.authenticate(&issued.token).await.unwrap();
        assert_eq!(session.subject_id, "u1");
        assert_eq!(session.token, issued.token);
        assert_eq!(session.expires_at, T0 + 3600);
    }

    #[tokio::test]
    async fn test_empty_token_is_missing() {
        let h = harness();
        assert_eq!(h.gate.authenticate("").await.unwrap_err(), AuthError::Missing);
        assert_eq!(h.gate.authenticate("   ").await.unwrap_err(), AuthError::Missing);
    }

    #[tokio::test]
    async fn test_logout_lifecycle() {
        let h = harness();
        let issued = h.gate.issue("u1").unwrap();

        // T0 + 30min: still good.
        h.clock.set(T0 + 30 * 60);
        assert_eq!(h.gate.authenticate(&issued.token).await.unwrap().subject_id, "u1");

        let outcome = h.gate.revoke(&issued.token).await.unwrap();
        assert_eq!(outcome, RevokeOutcome::Revoked { ttl_secs: 30 * 60 });
        assert_eq!(
            h.gate.authenticate(&issued.token).await.unwrap_err(),
            AuthError::Revoked
        );

        // T0 + 61min: entry gone, token simply expired.
        h.clock.set(T0 + 61 * 60);
        assert!(h.store.is_empty());
        assert_eq!(
            h.gate.authenticate(&issued.token).await.unwrap_err(),
            AuthError::Invalid
        );
    }

    #[tokio::test]
    async fn test_revoke_twice_is_idempotent() {
        let h = harness();
        let issued = h.gate.issue("u1").unwrap();

        h.gate.revoke(&issued.token).await.unwrap();
        h.gate.revoke(&issued.token).await.unwrap();

        assert_eq!(h.store.len(), 1);
        assert_eq!(
            h.gate.authenticate(&issued.token).await.unwrap_err(),
            AuthError::Revoked
        );
    }

    #[tokio::test]
    async fn test_revoke_expired_token_is_noop() {
        let h = harness();
        let issued = h.gate.issue("u1").unwrap();

        h.clock.advance(DEFAULT_TOKEN_TTL_SECS + 5);
        let outcome = h.gate.revoke(&issued.token).await.unwrap();
        assert_eq!(outcome, RevokeOutcome::AlreadyExpired);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_revocation_is_per_token() {
        let h = harness();
        let first = h.gate.issue("u1").unwrap();
        let second = h.gate.issue("u1").unwrap();

        h.gate.revoke(&first.token).await.unwrap();

        assert_eq!(
            h.gate.authenticate(&first.token).await.unwrap_err(),
            AuthError::Revoked
        );
        assert_eq!(h.gate.authenticate(&second.token).await.unwrap().subject_id, "u1");
    }

    #[tokio::test]
    async fn test_forged_token_cannot_be_revoked_or_used() {
        let h = harness();
        let clock: Arc<dyn Clock> = Arc::new(h.clock.clone());
        let rogue = JwtHandler::new(b"some-other-signing-key-0123456789", 3600, clock);
        let forged = rogue.issue("u1").unwrap();

        assert_eq!(
            h.gate.authenticate(&forged.token).await.unwrap_err(),
            AuthError::Invalid
        );
        assert!(matches!(
            h.gate.revoke(&forged.token).await,
            Err(RevokeError::Unauthenticated(AuthError::Invalid))
        ));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(T0));
        let jwt = Arc::new(JwtHandler::new(SECRET, 3600, clock));
        let gate = SessionGate::new(jwt, Arc::new(BrokenStore));

        let issued = gate.issue("u1").unwrap();
        assert_eq!(gate.authenticate(&issued.token).await.unwrap_err(), AuthError::Revoked);
        assert!(matches!(
            gate.revoke(&issued.token).await,
            Err(RevokeError::Store(_))
        ));
    }

    #[test]
    fn test_auth_error_messages_are_distinct() {
        let msgs = [
            AuthError::Missing.message(),
            AuthError::Revoked.message(),
            AuthError::Invalid.message(),
        ];
        assert_eq!(msgs[0], "No token, authorization denied");
        assert_eq!(msgs[1], "Token is blacklisted");
        assert_eq!(msgs[2], "Token is not valid");

        let resp = AuthError::Revoked.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
