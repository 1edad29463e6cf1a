//! JWT Token Handler
//! Mission: Mint and check signed, time-bounded session tokens

use crate::auth::clock::Clock;
use crate::auth::models::{Claims, IssuedToken};
use anyhow::{bail, Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Default token lifetime (one hour)
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// JWT Handler for token operations.
///
/// Stateless apart from the signing key and clock it was built with: issuing
/// writes nothing, verifying reads nothing but the token itself.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: &[u8], ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Generate a token for an already-authenticated subject
    pub fn issue(&self, subject_id: &str) -> Result<IssuedToken> {
        let now = self.clock.now();
        let claims = Claims {
            sub: subject_id.to_string(),
            iat: now,
            exp: now
                .checked_add(self.ttl_secs)
                .context("Invalid timestamp")?,
            jti: Uuid::new_v4().simple().to_string(),
        };

        debug!(
            subject = %subject_id,
            expires_in = self.ttl_secs,
            "Issuing session token"
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to generate JWT")?;

        Ok(IssuedToken { token, claims })
    }

    /// Check the signature only; expiry is left to the caller.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is judged against the injected clock, not jsonwebtoken's wall clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let decoded = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Invalid token signature or payload")?;

        Ok(decoded.claims)
    }

    /// Validate signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let claims = self.decode(token)?;
        if self.clock.now() >= claims.exp {
            bail!("Token expired at {}", claims.exp);
        }

        debug!(subject = %claims.sub, "Validated session token");

        Ok(claims)
    }
}
