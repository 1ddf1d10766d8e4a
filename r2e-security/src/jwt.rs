//! Token verification (spec.md §1 treats the JWT library itself as a pure
//! function — this module is the thin seam between that function and the
//! engine's `Principal`/`SecurityError` types).

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::SecurityError;
use crate::identity::Principal;

/// Pluggable token verification. The `auth` middleware depends on this
/// trait, not on `HmacJwtVerifier` directly, so the embedding application
/// can swap in its own verifier (e.g. one backed by a remote JWKS) without
/// touching the pipeline.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, SecurityError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(flatten)]
    extra: Value,
}

/// The default verifier: a single static HS256 secret, optionally checked
/// against an issuer/audience. Covers the one path the engine owns end to
/// end; anything beyond a static shared secret is the embedding
/// application's concern per spec.md §1.
pub struct HmacJwtVerifier {
    decoding_key: DecodingKey,
    issuer: Option<String>,
    audience: Option<String>,
}

impl HmacJwtVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

impl TokenVerifier for HmacJwtVerifier {
    fn verify(&self, token: &str) -> Result<Principal, SecurityError> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }
        if let Some(aud) = &self.audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                    SecurityError::ValidationFailed(e.to_string())
                }
                _ => SecurityError::InvalidToken(e.to_string()),
            }
        })?;

        debug!(sub = %data.claims.sub, "jwt verified");
        Ok(Principal {
            sub: data.claims.sub,
            roles: data.claims.roles,
            email: data.claims.email,
            claims: data.claims.extra,
        })
    }
}
