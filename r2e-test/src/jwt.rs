//! Test-only JWT minting. Mirrors [`r2e_security::HmacJwtVerifier`]'s
//! HS256-over-a-static-secret shape so a test can mint a token the engine's
//! `auth` middleware will actually accept, without reaching for a real
//! identity provider.

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// A fixed test secret, separate from anything an embedding application
/// configures for real. Use the same string when building the engine's
/// `HmacJwtVerifier` in a test so tokens round-trip.
pub const TEST_SECRET: &[u8] = b"r2e-test-secret";

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

/// Builds claim sets and encodes them with [`TEST_SECRET`].
pub struct TokenBuilder {
    sub: String,
    roles: Vec<String>,
    email: Option<String>,
    exp: i64,
    extra: Map<String, Value>,
}

impl TokenBuilder {
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            roles: Vec::new(),
            email: None,
            exp: now() + 3600,
            extra: Map::new(),
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set an absolute expiry, in seconds since the Unix epoch. Use a value
    /// in the past to build a token `HmacJwtVerifier` will reject as expired.
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = exp;
        self
    }

    pub fn claim(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> String {
        let mut claims = json!({
            "sub": self.sub,
            "roles": self.roles,
            "exp": self.exp,
        });
        if let Some(email) = self.email {
            claims["email"] = Value::String(email);
        }
        if let Value::Object(map) = &mut claims {
            map.extend(self.extra);
        }
        encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET))
            .expect("test claims always encode")
    }
}

/// Convenience constructors for the tokens most tests need.
pub struct TestJwt;

impl TestJwt {
    pub fn valid(sub: &str) -> String {
        TokenBuilder::new(sub).build()
    }

    pub fn with_roles(sub: &str, roles: &[&str]) -> String {
        TokenBuilder::new(sub).roles(roles.iter().map(|r| r.to_string())).build()
    }

    pub fn expired(sub: &str) -> String {
        TokenBuilder::new(sub).expires_at(now() - 60).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2e_security::{HmacJwtVerifier, TokenVerifier};

    #[test]
    fn minted_token_verifies_against_the_matching_secret() {
        let token = TestJwt::with_roles("user-1", &["admin"]);
        let verifier = HmacJwtVerifier::new(TEST_SECRET);
        let principal = verifier.verify(&token).unwrap();
        assert_eq!(principal.sub, "user-1");
        assert!(principal.has_role("admin"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = TestJwt::expired("user-1");
        let verifier = HmacJwtVerifier::new(TEST_SECRET);
        assert!(verifier.verify(&token).is_err());
    }
}
